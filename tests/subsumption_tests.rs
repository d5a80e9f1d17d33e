// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

mod common;

use common::ScriptedSolver;
use craig::expression::{Array, Expr, ExprRef};
use craig::ir::{Instruction, IrType, IrValue, Opcode};
use craig::itree::ITree;
use craig::options::Options;
use craig::solver::SmtResult;
use std::rc::Rc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sym(name: &str) -> ExprRef {
    let array = Array::new(name.to_string(), 4, 32, 8);
    Expr::read(array, None, Expr::constant(0, 32))
}

/// A straight-line prologue: `%a = alloca i32; store %v, %a` with `%v`
/// holding the given symbolic expression.
fn alloc_and_store(tree: &mut ITree, name: &str, expr: &ExprRef) -> (Rc<IrValue>, Rc<IrValue>) {
    let address = IrValue::local(&format!("{}_ptr", name), IrType::Pointer);
    let alloca = Instruction::alloca(address.clone(), IrType::Int(32));
    tree.execute(&alloca, &[Expr::constant(4096, 32)]);

    let data = IrValue::local(name, IrType::Int(32));
    let store = Instruction::new(
        IrValue::local(&format!("store_{}", name), IrType::Void),
        Opcode::Store,
        vec![data.clone(), address.clone()],
    );
    tree.execute(&store, &[expr.clone()]);
    (address, data)
}

fn icmp(tree: &mut ITree, name: &str, operand: &Rc<IrValue>, expr: &ExprRef) -> Rc<IrValue> {
    let result = IrValue::local(name, IrType::Int(1));
    let zero = IrValue::constant("0", IrType::Int(32));
    let instr = Instruction::new(result.clone(), Opcode::ICmp, vec![operand.clone(), zero]);
    tree.execute(&instr, &[expr.clone()]);
    result
}

#[test]
fn empty_entry_subsumes_any_state_without_the_solver() {
    init_logging();
    let mut tree = ITree::new(&Options::default());
    let (left, right) = tree.split(tree.root());
    let pp = 42;

    tree.set_current_node(left, pp);
    tree.remove(left);
    assert_eq!(tree.table_entries(pp).len(), 1);
    assert!(tree.table_entries(pp)[0].is_empty());

    tree.set_current_node(right, pp);
    let mut solver = ScriptedSolver::new(vec![]);
    assert!(tree.check_current_state_subsumption(&mut solver, pp, &[], 1.0));
    assert_eq!(solver.queries, 0);
    assert_eq!(tree.stats().subsumptions, 1);
}

#[test]
fn infeasible_path_core_becomes_an_interpolant_that_prunes_the_sibling() {
    init_logging();
    let mut tree = ITree::new(&Options::default());
    let v_expr = sym("v");
    let (a_ptr, v_value) = alloc_and_store(&mut tree, "v", &v_expr);

    let (left, right) = tree.split(tree.root());
    let pp = 777;
    tree.set_current_node(left, pp);

    let gt = Expr::sgt(v_expr.clone(), Expr::constant(0, 8));
    let c1 = icmp(&mut tree, "c1", &v_value, &gt);
    tree.add_constraint(gt.clone(), Some(&c1));

    let lt = Expr::slt(v_expr.clone(), Expr::constant(0, 8));
    let c2 = icmp(&mut tree, "c2", &v_value, &lt);
    tree.add_constraint(lt.clone(), Some(&c2));

    // The executor observed infeasibility; both constraints are the core.
    let mut mark_solver =
        ScriptedSolver::with_unsat_core(vec![], vec![gt.clone(), lt.clone()]);
    tree.mark_path_condition(&mut mark_solver, Some(&c2));
    tree.remove(left);

    let entries = tree.table_entries(pp);
    assert_eq!(entries.len(), 1);
    assert!(entries[0].interpolant.is_some());
    assert!(!entries[0].existentials.is_empty());
    assert_eq!(entries[0].singleton_store.len(), 1);
    assert_eq!(entries[0].singleton_store[0].0.id(), a_ptr.id());

    // The sibling reaches the same program point with the same store.
    tree.set_current_node(right, pp);
    let mut check_solver = ScriptedSolver::new(vec![SmtResult::Valid]);
    assert!(tree.check_current_state_subsumption(&mut check_solver, pp, &[], 1.0));
    assert_eq!(tree.stats().subsumptions, 1);
    // The shadow reads were pinned by the store equality, so the query came
    // out quantifier-free.
    assert_eq!(check_solver.queries, 1);
    assert_eq!(check_solver.quantified_queries, 0);
    assert_eq!(check_solver.timeouts_set, vec![1.0, 0.0]);
}

#[test]
fn store_footprint_lists_only_the_core_linked_allocation() {
    let mut tree = ITree::new(&Options::default());
    let p_expr = sym("p");
    let (p_ptr, _) = alloc_and_store(&mut tree, "p", &p_expr);
    let (_q_ptr, _) = alloc_and_store(&mut tree, "q", &sym("q"));
    let (_r_ptr, _) = alloc_and_store(&mut tree, "r", &sym("r"));

    // load %t := *%p
    let t_value = IrValue::local("t", IrType::Int(32));
    let load = Instruction::new(t_value.clone(), Opcode::Load, vec![p_ptr.clone()]);
    tree.execute(&load, &[p_expr.clone()]);

    let (left, _right) = tree.split(tree.root());
    let pp = 900;
    tree.set_current_node(left, pp);

    let cond = Expr::sgt(p_expr.clone(), Expr::constant(7, 8));
    let c = icmp(&mut tree, "c", &t_value, &cond);
    tree.add_constraint(cond.clone(), Some(&c));

    let mut mark_solver = ScriptedSolver::with_unsat_core(vec![], vec![cond]);
    tree.mark_path_condition(&mut mark_solver, Some(&c));
    tree.remove(left);

    let entries = tree.table_entries(pp);
    assert_eq!(entries.len(), 1);
    // Only the loaded allocation feeds the core; the two merely-written ones
    // must stay out of the entry.
    assert_eq!(entries[0].singleton_store.len(), 1);
    assert_eq!(entries[0].singleton_store[0].0.id(), p_ptr.id());
}

#[test]
fn quantified_queries_take_the_direct_solver_path() {
    let mut tree = ITree::new(&Options::default());
    let v_expr = sym("v");

    let (left, right) = tree.split(tree.root());
    let pp = 1234;
    tree.set_current_node(left, pp);

    // An unsigned bound is not linearized away, so the shadow read survives
    // simplification and the query stays quantified.
    let bound = Expr::ult(v_expr.clone(), Expr::constant(5, 8));
    tree.add_constraint(bound.clone(), None);
    let mut mark_solver = ScriptedSolver::with_unsat_core(vec![], vec![bound]);
    tree.mark_path_condition(&mut mark_solver, None);
    tree.remove(left);

    tree.set_current_node(right, pp);
    let mut check_solver = ScriptedSolver::new(vec![SmtResult::Valid]);
    assert!(tree.check_current_state_subsumption(&mut check_solver, pp, &[], 0.5));
    assert_eq!(check_solver.quantified_queries, 1);
}

#[test]
fn failed_checks_move_on_and_count_solver_failures() {
    let mut tree = ITree::new(&Options::default());
    let v_expr = sym("v");

    let (left, right) = tree.split(tree.root());
    let pp = 31;
    tree.set_current_node(left, pp);
    let bound = Expr::ult(v_expr.clone(), Expr::constant(5, 8));
    tree.add_constraint(bound.clone(), None);
    let mut mark_solver = ScriptedSolver::with_unsat_core(vec![], vec![bound]);
    tree.mark_path_condition(&mut mark_solver, None);
    tree.remove(left);

    tree.set_current_node(right, pp);
    let mut undecided = ScriptedSolver::new(vec![SmtResult::Undefined]);
    assert!(!tree.check_current_state_subsumption(&mut undecided, pp, &[], 1.0));
    assert_eq!(tree.stats().solver_failures, 1);
    assert_eq!(tree.stats().subsumptions, 0);
    assert!(!tree.node_data(right).is_subsumed());
}

#[test]
fn check_is_gated_on_the_program_point() {
    let mut tree = ITree::new(&Options::default());
    let (left, right) = tree.split(tree.root());
    let pp = 5;
    tree.set_current_node(left, pp);
    tree.remove(left);

    tree.set_current_node(right, pp);
    let mut solver = ScriptedSolver::new(vec![]);
    // The state is at a different instruction than the node was named after.
    assert!(!tree.check_current_state_subsumption(&mut solver, pp + 1, &[], 1.0));
    assert_eq!(solver.queries, 0);
}

#[test]
fn table_only_grows_and_keeps_insertion_order() {
    let mut tree = ITree::new(&Options::default());
    let v_expr = sym("v");
    let (left, right) = tree.split(tree.root());
    let pp = 64;

    tree.set_current_node(left, pp);
    let bound = Expr::ult(v_expr.clone(), Expr::constant(5, 8));
    tree.add_constraint(bound.clone(), None);
    let mut mark_solver = ScriptedSolver::with_unsat_core(vec![], vec![bound]);
    tree.mark_path_condition(&mut mark_solver, None);
    tree.remove(left);
    assert_eq!(tree.table_entries(pp).len(), 1);

    tree.set_current_node(right, pp);
    tree.remove(right);
    let entries = tree.table_entries(pp);
    assert_eq!(entries.len(), 2);
    assert!(entries[0].interpolant.is_some());
    assert!(entries[1].interpolant.is_none());
}

#[test]
fn disabled_interpolation_turns_everything_off() {
    let mut options = Options::default();
    options.interpolation = false;
    let mut tree = ITree::new(&options);

    let v_expr = sym("v");
    alloc_and_store(&mut tree, "v", &v_expr);
    let (left, right) = tree.split(tree.root());
    tree.set_current_node(left, 7);
    tree.add_constraint(Expr::sgt(v_expr, Expr::constant(0, 8)), None);
    tree.remove(left);
    assert_eq!(tree.table_len(), 0);

    tree.set_current_node(right, 7);
    let mut solver = ScriptedSolver::new(vec![SmtResult::Valid]);
    assert!(!tree.check_current_state_subsumption(&mut solver, 7, &[], 1.0));
    assert_eq!(solver.queries, 0);
}

#[test]
fn search_tree_dump_records_splits_and_subsumptions() {
    let mut options = Options::default();
    options.output_interpolation_tree = true;
    let mut tree = ITree::new(&options);

    let (left, right) = tree.split(tree.root());
    let pp = 11;
    tree.set_current_node(left, pp);
    tree.remove(left);
    tree.set_current_node(right, pp);
    let mut solver = ScriptedSolver::new(vec![]);
    assert!(tree.check_current_state_subsumption(&mut solver, pp, &[], 1.0));

    let dot = tree.search_tree_dot().expect("export was enabled");
    assert!(dot.contains("@11"));
    assert!(dot.contains("subsumed"));
}
