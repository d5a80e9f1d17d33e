// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use craig::dependency::AllocationKind;
use craig::expression::{Array, Expr, ExprRef};
use craig::ir::{Instruction, IrType, IrValue, Opcode, ENVIRONMENT_NAME};
use craig::itree::ITree;
use craig::options::Options;
use std::rc::Rc;

fn sym(name: &str) -> ExprRef {
    let array = Array::new(name.to_string(), 4, 32, 8);
    Expr::read(array, None, Expr::constant(0, 32))
}

fn alloca(tree: &mut ITree, name: &str, allocated: IrType) -> Rc<IrValue> {
    let value = IrValue::local(name, IrType::Pointer);
    let instr = Instruction::alloca(value.clone(), allocated);
    tree.execute(&instr, &[Expr::constant(4096, 32)]);
    value
}

fn store(tree: &mut ITree, name: &str, data: &Rc<IrValue>, address: &Rc<IrValue>, expr: ExprRef) {
    let instr = Instruction::new(
        IrValue::local(name, IrType::Void),
        Opcode::Store,
        vec![data.clone(), address.clone()],
    );
    tree.execute(&instr, &[expr]);
}

#[test]
fn singleton_stores_are_destructive() {
    let mut tree = ITree::new(&Options::default());
    let a = alloca(&mut tree, "a", IrType::Int(32));
    let three = IrValue::constant("3", IrType::Int(32));
    let five = IrValue::constant("5", IrType::Int(32));
    store(&mut tree, "st1", &three, &a, Expr::constant(3, 8));
    store(&mut tree, "st2", &five, &a, Expr::constant(5, 8));

    let dependency = tree.node_data(tree.current_node()).dependency().clone();
    let allocation = dependency.get_latest_allocation(&a).unwrap();
    assert_eq!(allocation.kind(), AllocationKind::Singleton);

    let stored = dependency.stores(&allocation);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].expression().as_constant(), Some((5, 8)));

    // One version per update: the initial allocation plus one per store.
    let versions = dependency
        .all_versioned_allocations()
        .iter()
        .filter(|site| site.id() == a.id())
        .count();
    assert_eq!(versions, 3);
}

#[test]
fn composite_stores_aggregate_field_insensitively() {
    let mut tree = ITree::new(&Options::default());
    let s = alloca(&mut tree, "s", IrType::Struct);

    // Element pointers alias the whole object.
    let f = IrValue::local("f", IrType::Pointer);
    let gep_f = Instruction::new(f.clone(), Opcode::GetElementPtr, vec![s.clone()]);
    tree.execute(&gep_f, &[Expr::constant(4100, 32)]);
    let g = IrValue::local("g", IrType::Pointer);
    let gep_g = Instruction::new(g.clone(), Opcode::GetElementPtr, vec![s.clone()]);
    tree.execute(&gep_g, &[Expr::constant(4104, 32)]);

    let three = IrValue::constant("3", IrType::Int(32));
    let four = IrValue::constant("4", IrType::Int(32));
    store(&mut tree, "st_f", &three, &f, Expr::constant(3, 8));
    store(&mut tree, "st_g", &four, &g, Expr::constant(4, 8));

    let dependency = tree.node_data(tree.current_node()).dependency().clone();
    let allocation = dependency.get_latest_allocation(&s).unwrap();
    assert!(allocation.is_composite());

    let mut stored: Vec<u64> = dependency
        .stores(&allocation)
        .iter()
        .map(|value| value.expression().as_constant().unwrap().0)
        .collect();
    stored.sort();
    assert_eq!(stored, vec![3, 4]);

    // Composites keep one stable identity across updates.
    assert!(dependency
        .all_versioned_allocations()
        .iter()
        .all(|site| site.id() != s.id()));
}

#[test]
fn stores_respect_the_node_scope() {
    let mut tree = ITree::new(&Options::default());
    let a = alloca(&mut tree, "a", IrType::Int(32));
    let seven = IrValue::constant("7", IrType::Int(32));
    store(&mut tree, "st_root", &seven, &a, Expr::constant(7, 8));

    let root_dependency = tree.node_data(tree.root()).dependency().clone();

    let (left, _right) = tree.split(tree.root());
    tree.set_current_node(left, 1);
    let nine = IrValue::constant("9", IrType::Int(32));
    store(&mut tree, "st_left", &nine, &a, Expr::constant(9, 8));

    let left_dependency = tree.node_data(left).dependency().clone();
    let left_latest = left_dependency.get_latest_allocation(&a).unwrap();
    let left_stored = left_dependency.stores(&left_latest);
    assert_eq!(left_stored.len(), 1);
    assert_eq!(left_stored[0].expression().as_constant(), Some((9, 8)));

    // The parent still observes its own latest version.
    let root_latest = root_dependency.get_latest_allocation(&a).unwrap();
    let root_stored = root_dependency.stores(&root_latest);
    assert_eq!(root_stored.len(), 1);
    assert_eq!(root_stored[0].expression().as_constant(), Some((7, 8)));
}

#[test]
fn composite_aggregation_crosses_the_parent_chain() {
    let mut tree = ITree::new(&Options::default());
    let s = alloca(&mut tree, "s", IrType::Struct);
    let f = IrValue::local("f", IrType::Pointer);
    let gep = Instruction::new(f.clone(), Opcode::GetElementPtr, vec![s.clone()]);
    tree.execute(&gep, &[Expr::constant(4100, 32)]);
    let three = IrValue::constant("3", IrType::Int(32));
    store(&mut tree, "st_root", &three, &f, Expr::constant(3, 8));

    let (left, _right) = tree.split(tree.root());
    tree.set_current_node(left, 1);
    let four = IrValue::constant("4", IrType::Int(32));
    store(&mut tree, "st_left", &four, &f, Expr::constant(4, 8));

    let dependency = tree.node_data(left).dependency().clone();
    let allocation = dependency.get_latest_allocation(&s).unwrap();
    let stored: Vec<u64> = dependency
        .stores(&allocation)
        .iter()
        .map(|value| value.expression().as_constant().unwrap().0)
        .collect();
    // Parent history first, then the local store.
    assert_eq!(stored, vec![3, 4]);
}

#[test]
fn loads_observe_the_latest_store_through_flow() {
    let mut tree = ITree::new(&Options::default());
    let a = alloca(&mut tree, "a", IrType::Int(32));
    let v_expr = sym("v");
    let v = IrValue::local("v", IrType::Int(32));
    store(&mut tree, "st", &v, &a, v_expr.clone());

    let t = IrValue::local("t", IrType::Int(32));
    let load = Instruction::new(t.clone(), Opcode::Load, vec![a.clone()]);
    tree.execute(&load, &[v_expr.clone()]);

    let dependency = tree.node_data(tree.current_node()).dependency().clone();
    assert!(dependency.get_latest_value(&t).is_some());
}

#[test]
fn untracked_load_addresses_get_a_fallback_allocation() {
    let mut tree = ITree::new(&Options::default());
    let u = IrValue::local("u", IrType::Pointer);
    let t = IrValue::local("t", IrType::Int(32));
    let load = Instruction::new(t.clone(), Opcode::Load, vec![u.clone()]);
    let loaded = sym("loaded");
    tree.execute(&load, &[loaded.clone()]);

    let dependency = tree.node_data(tree.current_node()).dependency().clone();
    let allocation = dependency.get_latest_allocation(&u).unwrap();
    let stored = dependency.stores(&allocation);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].expression(), &loaded);
}

#[test]
fn environment_loads_share_one_allocation() {
    let mut tree = ITree::new(&Options::default());
    let environ = IrValue::constant(ENVIRONMENT_NAME, IrType::Pointer);

    let e1 = IrValue::local("e1", IrType::Pointer);
    let load1 = Instruction::new(e1.clone(), Opcode::Load, vec![environ.clone()]);
    tree.execute(&load1, &[Expr::constant(8192, 32)]);
    let e2 = IrValue::local("e2", IrType::Pointer);
    let load2 = Instruction::new(e2.clone(), Opcode::Load, vec![environ.clone()]);
    tree.execute(&load2, &[Expr::constant(8192, 32)]);

    let dependency = tree.node_data(tree.current_node()).dependency().clone();
    let v1 = dependency.get_latest_value(&e1).unwrap();
    let v2 = dependency.get_latest_value(&e2).unwrap();
    let a1 = dependency.resolve_allocation_transitively(&v1);
    let a2 = dependency.resolve_allocation_transitively(&v2);
    assert_eq!(a1.len(), 1);
    assert_eq!(a2.len(), 1);
    assert_eq!(a1[0].id(), a2[0].id());
    assert_eq!(a1[0].kind(), AllocationKind::Environment);
}

#[test]
fn call_arguments_bind_formals_to_actuals() {
    let mut tree = ITree::new(&Options::default());
    let x = IrValue::local("x", IrType::Int(32));
    let fx = IrValue::argument("fx", IrType::Int(32));
    let call_result = IrValue::local("call", IrType::Int(32));
    let site = Instruction::call(call_result.clone(), vec![x.clone()], vec![fx.clone()]);

    let x_expr = sym("x");
    tree.bind_call_arguments(&site, &[x_expr.clone()]);

    let dependency = tree.node_data(tree.current_node()).dependency().clone();
    let formal = dependency.get_latest_value(&fx).unwrap();
    assert_eq!(formal.expression(), &x_expr);

    // The callee computes a value from its formal and returns it.
    let rv = IrValue::local("rv", IrType::Int(32));
    let one = IrValue::constant("1", IrType::Int(32));
    let add = Instruction::new(rv.clone(), Opcode::Add, vec![fx.clone(), one]);
    let rv_expr = Expr::add(x_expr.clone(), Expr::constant(1, 8));
    tree.execute(&add, &[rv_expr.clone()]);

    let ret = Instruction::new(
        IrValue::local("ret", IrType::Void),
        Opcode::Ret,
        vec![rv.clone()],
    );
    tree.bind_return_value(&site, &ret, rv_expr.clone());

    let bound = dependency.get_latest_value(&call_result).unwrap();
    assert_eq!(bound.expression(), &rv_expr);
}

#[test]
fn calls_with_unknown_callees_are_not_tracked() {
    let mut tree = ITree::new(&Options::default());
    let x = IrValue::local("x", IrType::Int(32));
    let call_result = IrValue::local("call", IrType::Int(32));
    let site = Instruction::call(call_result.clone(), vec![x.clone()], vec![]);
    tree.bind_call_arguments(&site, &[sym("x")]);

    let dependency = tree.node_data(tree.current_node()).dependency().clone();
    assert!(dependency.get_latest_value(&x).is_none());
}
