// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use craig::expression::{Array, Expr, ExprKind, ExprRef};
use craig::simplification::simplify_existential;
use std::rc::Rc;

fn variable(name: &str) -> (Rc<Array>, ExprRef) {
    let array = Array::new(name.to_string(), 4, 32, 8);
    let read = Expr::read(array.clone(), None, Expr::constant(0, 32));
    (array, read)
}

fn conjuncts(expr: &ExprRef) -> Vec<ExprRef> {
    match &expr.kind {
        ExprKind::And { left, right } => {
            let mut result = conjuncts(left);
            result.extend(conjuncts(right));
            result
        }
        _ => vec![expr.clone()],
    }
}

#[test]
fn elimination_projects_the_bound_variable_away() {
    let (x_array, x) = variable("x");
    let (_, y) = variable("y");
    let (_, w) = variable("w");
    let (_, v) = variable("v");

    // exists x . (x <= y + 1 /\ x >= y - 1) /\ (w == v)
    let interpolant = Expr::and(
        Expr::sle(x.clone(), Expr::add(y.clone(), Expr::constant(1, 8))),
        Expr::sge(x.clone(), Expr::sub(y.clone(), Expr::constant(1, 8))),
    );
    let equality = Expr::equals(w.clone(), v.clone());
    let exists = Expr::exists(vec![x_array.clone()], Expr::and(interpolant, equality));

    let result = simplify_existential(&exists);
    assert!(!result.mentions_any_array(std::slice::from_ref(&x_array)));
    // The x bounds cancel (y - 1 <= y + 1 is vacuous) and the equality
    // survives as its two inequalities.
    assert_eq!(result, Expr::and(Expr::sle(w.clone(), v.clone()), Expr::sge(w, v)));
}

#[test]
fn pinned_bound_reads_are_substituted_out() {
    let (x_array, x) = variable("x");
    let (_, y) = variable("y");
    let (_, z) = variable("z");

    // exists x . (x <= y + 1 /\ x >= y - 1) /\ (x == z)
    let upper = Expr::add(y.clone(), Expr::constant(1, 8));
    let lower = Expr::sub(y.clone(), Expr::constant(1, 8));
    let body = Expr::and(
        Expr::and(Expr::sle(x.clone(), upper.clone()), Expr::sge(x.clone(), lower.clone())),
        Expr::equals(x.clone(), z.clone()),
    );
    let result = simplify_existential(&Expr::exists(vec![x_array.clone()], body));

    assert!(!result.mentions_any_array(std::slice::from_ref(&x_array)));
    assert_eq!(
        result,
        Expr::and(Expr::sle(z.clone(), upper), Expr::sge(z, lower))
    );
}

#[test]
fn negated_comparisons_unwrap_and_drop_state_equalities() {
    let (x_array, _) = variable("x");
    let (_, a) = variable("a");
    let (_, b) = variable("b");
    let (_, w) = variable("w");
    let (_, v) = variable("v");

    // exists x . Eq(false, a < b) /\ (w == v)
    let body = Expr::and(
        Expr::equals(Expr::bool_constant(false), Expr::slt(a.clone(), b.clone())),
        Expr::equals(w, v),
    );
    let result = simplify_existential(&Expr::exists(vec![x_array], body));
    // The interpolant mentions no existential at all, so it is returned
    // directly in negated form.
    assert_eq!(result, Expr::sge(a, b));
}

#[test]
fn strict_bounds_stay_strict_through_matching() {
    let (x_array, x) = variable("x");
    let (_, u) = variable("u");
    let (_, l) = variable("l");
    let (_, w) = variable("w");
    let (_, v) = variable("v");

    // exists x . (x < u /\ x > l) /\ (w == v)
    let body = Expr::and(
        Expr::and(Expr::slt(x.clone(), u.clone()), Expr::sgt(x.clone(), l.clone())),
        Expr::equals(w, v),
    );
    let result = simplify_existential(&Expr::exists(vec![x_array.clone()], body));
    assert!(!result.mentions_any_array(std::slice::from_ref(&x_array)));
    assert!(conjuncts(&result).contains(&Expr::slt(l, u)));
}

#[test]
fn negative_coefficients_flip_the_comparator() {
    let (x_array, x) = variable("x");
    let (_, y) = variable("y");
    let (_, w) = variable("w");
    let (_, v) = variable("v");

    // exists x . (0 - x <= y /\ x < 5) /\ (w == v)
    // The lower bound arrives as -x <= y, i.e. x >= -y after division by -1.
    let body = Expr::and(
        Expr::and(
            Expr::sle(Expr::sub(Expr::constant(0, 8), x.clone()), y.clone()),
            Expr::slt(x.clone(), Expr::constant(5, 8)),
        ),
        Expr::equals(w, v),
    );
    let result = simplify_existential(&Expr::exists(vec![x_array.clone()], body));
    assert!(!result.mentions_any_array(std::slice::from_ref(&x_array)));
    let expected = Expr::slt(
        Expr::mul(y, Expr::constant(255, 8)),
        Expr::constant(5, 8),
    );
    assert!(conjuncts(&result).contains(&expected));
}

#[test]
fn cancelling_migrated_terms_still_isolate_the_bound_variable() {
    let (x_array, x) = variable("x");
    let (_, y) = variable("y");
    let (_, z) = variable("z");
    let (_, w) = variable("w");
    let (_, v) = variable("v");

    // exists x . (x + y <= y /\ x >= z) /\ (w == v)
    // Migrating y to the right cancels it to weight zero; the focus variable
    // must still come out isolated, yielding z <= 0.
    let body = Expr::and(
        Expr::and(
            Expr::sle(Expr::add(x.clone(), y.clone()), y.clone()),
            Expr::sge(x.clone(), z.clone()),
        ),
        Expr::equals(w, v),
    );
    let result = simplify_existential(&Expr::exists(vec![x_array.clone()], body));
    assert!(!result.mentions_any_array(std::slice::from_ref(&x_array)));
    assert!(conjuncts(&result).contains(&Expr::sle(z, Expr::constant(0, 8))));
}

#[test]
fn disjunctive_equality_sides_are_left_alone() {
    let (x_array, x) = variable("x");
    let (_, a) = variable("a");
    let (_, b) = variable("b");

    let interpolant = Expr::ult(x, Expr::constant(5, 8));
    let disjunction = Expr::or(
        Expr::equals(a.clone(), b.clone()),
        Expr::equals(b, Expr::constant(0, 8)),
    );
    let exists = Expr::exists(vec![x_array], Expr::and(interpolant, disjunction));
    let result = simplify_existential(&exists);
    assert!(Rc::ptr_eq(&result, &exists));
}

#[test]
fn non_conjunctive_bodies_pass_through() {
    let (x_array, x) = variable("x");
    let exists = Expr::exists(vec![x_array], Expr::ult(x, Expr::constant(5, 8)));
    let result = simplify_existential(&exists);
    assert!(Rc::ptr_eq(&result, &exists));
}

#[test]
fn unsigned_atoms_survive_elimination_untouched() {
    let (x_array, x) = variable("x");
    let (_, w) = variable("w");
    let (_, v) = variable("v");

    let bound = Expr::ult(x.clone(), Expr::constant(5, 8));
    let body = Expr::and(bound.clone(), Expr::equals(w, v));
    let result = simplify_existential(&Expr::exists(vec![x_array.clone()], body));
    // The unsigned atom cannot be linearized, so the existential remains.
    match &result.kind {
        ExprKind::Exists { bound: arrays, body } => {
            assert_eq!(arrays.len(), 1);
            assert!(body.mentions_any_array(std::slice::from_ref(&x_array)));
        }
        _ => panic!("expected the existential to survive: {:?}", result),
    }
    assert!(conjuncts(match &result.kind {
        ExprKind::Exists { body, .. } => body,
        _ => unreachable!(),
    })
    .contains(&bound));
}
