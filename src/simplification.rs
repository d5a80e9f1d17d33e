// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::expression::{Array, Expr, ExprKind, ExprRef, Width};
use crate::k_limits;

use log::trace;
use mirai_annotations::*;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/// The coefficient map of one side of a linear atom. The constant
/// contribution rides under a zero-literal pseudo-term so coefficient
/// arithmetic applies uniformly.
type Terms = BTreeMap<ExprRef, i64>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum BoundKind {
    Sle,
    Slt,
    Sge,
    Sgt,
}

impl BoundKind {
    fn flip(self) -> BoundKind {
        match self {
            BoundKind::Sle => BoundKind::Sge,
            BoundKind::Slt => BoundKind::Sgt,
            BoundKind::Sge => BoundKind::Sle,
            BoundKind::Sgt => BoundKind::Slt,
        }
    }

    fn is_upper(self) -> bool {
        matches!(self, BoundKind::Sle | BoundKind::Slt)
    }

    fn is_strict(self) -> bool {
        matches!(self, BoundKind::Slt | BoundKind::Sgt)
    }
}

#[derive(Clone, Debug)]
struct Inequality {
    left: Terms,
    right: Terms,
    kind: BoundKind,
    width: Width,
}

/// An atom fed through elimination: either a linearized signed comparison or
/// an opaque expression that rides along verbatim.
#[derive(Clone, Debug)]
enum FmAtom {
    Linear(Inequality),
    Opaque(ExprRef),
}

/// True when the expression mentions any of the bound arrays.
pub fn has_existentials(bound: &[Rc<Array>], expr: &ExprRef) -> bool {
    expr.mentions_any_array(bound)
}

/// True when `expr` is a pure read (or a concatenation of reads) of one of
/// the bound arrays.
fn is_bound_read(bound: &[Rc<Array>], expr: &ExprRef) -> bool {
    match &expr.kind {
        ExprKind::Read { root, .. } => bound.iter().any(|a| Rc::ptr_eq(a, root)),
        ExprKind::Concat { left, right } => {
            is_bound_read(bound, left) && is_bound_read(bound, right)
        }
        _ => false,
    }
}

/// Structural containment check used by the arithmetic-substitution step;
/// only the first two children are inspected, mirroring the shape assumptions
/// of the rewrite it guards.
fn contains_shadow_expr(expr: &ExprRef, target: &ExprRef) -> bool {
    if expr == target {
        return true;
    }
    let children = expr.children();
    if children.len() < 2 {
        return false;
    }
    contains_shadow_expr(children[0], target) || contains_shadow_expr(children[1], target)
}

/// Rewrites occurrences of `replaced` inside a binary tree with `substitute`.
/// Non-binary nodes (and concatenations) are left alone.
fn replace_expr(original: &ExprRef, replaced: &ExprRef, substitute: &ExprRef) -> ExprRef {
    if original.binary_operands().is_none() {
        return original.clone();
    }
    let (left, right) = original.binary_operands().unwrap();
    if left == replaced {
        return Expr::binary_of_same_kind(original, substitute.clone(), right.clone());
    }
    if right == replaced {
        return Expr::binary_of_same_kind(original, left.clone(), substitute.clone());
    }
    Expr::binary_of_same_kind(
        original,
        replace_expr(left, replaced, substitute),
        replace_expr(right, replaced, substitute),
    )
}

/// Applies a term-for-term substitution across the whole tree.
fn substitute_all(expr: &ExprRef, map: &HashMap<ExprRef, ExprRef>) -> ExprRef {
    if let Some(replacement) = map.get(expr) {
        return replacement.clone();
    }
    use self::ExprKind::*;
    match &expr.kind {
        Constant { .. } | Read { .. } => expr.clone(),
        Concat { left, right } => {
            Expr::concat(substitute_all(left, map), substitute_all(right, map))
        }
        Extract {
            expr: operand,
            offset,
            width,
        } => Expr::extract(substitute_all(operand, map), *offset, *width),
        ZExt {
            expr: operand,
            width,
        } => Expr::zext(substitute_all(operand, map), *width),
        SExt {
            expr: operand,
            width,
        } => Expr::sext(substitute_all(operand, map), *width),
        Not { operand } => Expr::not(substitute_all(operand, map)),
        Select {
            condition,
            consequent,
            alternate,
        } => Expr::select(
            substitute_all(condition, map),
            substitute_all(consequent, map),
            substitute_all(alternate, map),
        ),
        Exists { bound, body } => Expr::exists(bound.clone(), substitute_all(body, map)),
        _ => {
            let (left, right) = expr
                .binary_operands()
                .unwrap_or_else(|| assume_unreachable!("unhandled kind: {:?}", expr));
            Expr::binary_of_same_kind(expr, substitute_all(left, map), substitute_all(right, map))
        }
    }
}

/// Folds constant equalities and collects the atomic equalities of a
/// conjunction. Disjuncts are simplified with a throw-away pack: atomic
/// equalities inside a disjunctive clause do not simplify the interpolant.
fn simplify_equality_expr(pack: &mut Vec<ExprRef>, expr: &ExprRef) -> ExprRef {
    if expr.children().len() < 2 {
        return expr.clone();
    }
    match &expr.kind {
        ExprKind::Eq { left, right } => {
            if left.is_constant() && right.is_constant() {
                return Expr::bool_constant(left == right);
            }
            if !pack.contains(expr) {
                pack.push(expr.clone());
            }
            expr.clone()
        }
        ExprKind::And { left, right } => {
            let lhs = simplify_equality_expr(pack, left);
            if lhs.is_false() {
                return lhs;
            }
            let rhs = simplify_equality_expr(pack, right);
            if rhs.is_false() {
                return rhs;
            }
            if lhs.is_true() {
                return rhs;
            }
            if rhs.is_true() {
                return lhs;
            }
            Expr::and(lhs, rhs)
        }
        ExprKind::Or { left, right } => {
            let mut dummy = Vec::new();
            let lhs = simplify_equality_expr(&mut dummy, left);
            if lhs.is_true() {
                return lhs;
            }
            let rhs = simplify_equality_expr(&mut dummy, right);
            if rhs.is_true() {
                return rhs;
            }
            if lhs.is_false() {
                return rhs;
            }
            if rhs.is_false() {
                return lhs;
            }
            Expr::or(lhs, rhs)
        }
        _ => assume_unreachable!("unexpected equality constraint: {:?}", expr),
    }
}

/// Negates a comparison wrapped as Eq(false, cmp).
fn negate_comparison(cmp: &ExprRef) -> Option<ExprRef> {
    let (left, right) = cmp.binary_operands()?;
    match &cmp.kind {
        ExprKind::Slt { .. } => Some(Expr::sge(left.clone(), right.clone())),
        ExprKind::Sle { .. } => Some(Expr::sgt(left.clone(), right.clone())),
        ExprKind::Sgt { .. } => Some(Expr::sle(left.clone(), right.clone())),
        ExprKind::Sge { .. } => Some(Expr::slt(left.clone(), right.clone())),
        ExprKind::Ult { .. } => Some(Expr::uge(left.clone(), right.clone())),
        ExprKind::Ule { .. } => Some(Expr::ugt(left.clone(), right.clone())),
        ExprKind::Ugt { .. } => Some(Expr::ule(left.clone(), right.clone())),
        ExprKind::Uge { .. } => Some(Expr::ult(left.clone(), right.clone())),
        _ => None,
    }
}

/// Folds constant comparisons and collects the atomic comparisons of the
/// interpolant conjunction, rewriting Eq(false, cmp) into the negation of
/// cmp along the way.
fn simplify_interpolant_expr(pack: &mut Vec<ExprRef>, expr: &ExprRef) -> ExprRef {
    if expr.children().len() < 2 {
        return expr.clone();
    }
    if let ExprKind::Eq { left, right } = &expr.kind {
        if left.is_constant() && right.is_constant() {
            return Expr::bool_constant(left == right);
        }
        if left.is_false() {
            if let Some(negated) = negate_comparison(right) {
                if !pack.contains(&negated) {
                    pack.push(negated.clone());
                }
                return negated;
            }
        }
    }
    if let ExprKind::Ne { left, right } = &expr.kind {
        if left.is_constant() && right.is_constant() {
            return Expr::bool_constant(left != right);
        }
    }
    if let ExprKind::And { left, right } = &expr.kind {
        return Expr::and(
            simplify_interpolant_expr(pack, left),
            simplify_interpolant_expr(pack, right),
        );
    }
    if !pack.contains(expr) {
        pack.push(expr.clone());
    }
    expr.clone()
}

/// The coefficient map of one arithmetic side. Binary arithmetic recurses;
/// everything else (reads, concatenations, casts) is one opaque term.
fn coefficients(expr: &ExprRef) -> Terms {
    let children = expr.children();
    if children.len() == 2 && !matches!(expr.kind, ExprKind::Concat { .. }) {
        let left = coefficients(children[0]);
        let right = coefficients(children[1]);
        return coefficient_operation(expr, left, right);
    }
    let mut map = Terms::new();
    if let Some((_, width)) = expr.as_constant() {
        map.insert(
            Expr::constant(0, width),
            expr.as_signed_constant().unwrap_or(0),
        );
    } else {
        map.insert(expr.clone(), 1);
    }
    map
}

/// Combines two coefficient maps under the given operator. Addition and
/// subtraction combine coefficients with the proper sign; multiplication,
/// division and remainder apply the operator entry-wise on matched terms,
/// which is not linear in general but only linear inputs are expected there.
fn coefficient_operation(operator: &ExprRef, map1: Terms, map2: Terms) -> Terms {
    use self::ExprKind::*;
    match &operator.kind {
        Add { .. } | Sub { .. } => {
            let negate = matches!(operator.kind, Sub { .. });
            let mut result = map1;
            for (term, coefficient) in map2 {
                let signed = if negate { -coefficient } else { coefficient };
                let entry = result.entry(term).or_insert(0);
                *entry += signed;
            }
            result.retain(|_, coefficient| *coefficient != 0);
            result
        }
        _ => {
            let mut result = map2;
            for (term, coefficient) in map1 {
                match result.get_mut(&term) {
                    Some(existing) => match &operator.kind {
                        Mul { .. } => *existing = coefficient * *existing,
                        UDiv { .. } | SDiv { .. } => {
                            if *existing != 0 {
                                *existing = coefficient / *existing;
                            }
                        }
                        URem { .. } | SRem { .. } => {
                            if *existing != 0 {
                                *existing = coefficient % *existing;
                            }
                        }
                        _ => {}
                    },
                    None => {
                        result.insert(term, coefficient);
                    }
                }
            }
            result
        }
    }
}

/// True when the term is a read (possibly wrapped in a concatenation of byte
/// reads) rooted at the on-focus array.
fn is_focus_term(term: &ExprRef, focus: &Rc<Array>) -> bool {
    match Expr::read_root(term) {
        Some(root) => Rc::ptr_eq(&root, focus),
        None => false,
    }
}

// Zero-weight entries are kept here on purpose: they still occupy their
// side for the normalization commit gate. Only the matching phase sweeps
// them out.
fn merge_term(map: &mut Terms, term: ExprRef, coefficient: i64) {
    *map.entry(term).or_insert(0) += coefficient;
}

/// Moves every movable non-focus term (reads of other arrays and constants)
/// to the right, and focus terms found on the right to the left. The moves
/// are committed only when both sides stay populated; an atom that empties a
/// side keeps its source form for reconstruction. Reports whether the focus
/// variable ended up on the left.
fn normalize(focus: &Rc<Array>, inequality: &mut Inequality) -> bool {
    let mut focus_on_left = false;
    let mut left = inequality.left.clone();
    let mut right = inequality.right.clone();
    let left_terms: Vec<(ExprRef, i64)> = left.iter().map(|(k, v)| (k.clone(), *v)).collect();
    for (term, coefficient) in left_terms {
        if is_focus_term(&term, focus) {
            focus_on_left = true;
        } else if Expr::read_root(&term).is_some() || term.is_constant() {
            left.remove(&term);
            merge_term(&mut right, term, -coefficient);
        }
    }
    let right_terms: Vec<(ExprRef, i64)> = right.iter().map(|(k, v)| (k.clone(), *v)).collect();
    for (term, coefficient) in right_terms {
        if is_focus_term(&term, focus) {
            right.remove(&term);
            merge_term(&mut left, term, -coefficient);
            focus_on_left = true;
        }
    }
    if !left.is_empty() && !right.is_empty() {
        inequality.left = left;
        inequality.right = right;
    }
    focus_on_left
}

/// Divides through so the lone focus term carries coefficient one, flipping
/// the comparator when dividing by a negative.
fn divide_through(inequality: &mut Inequality) {
    let (term, coefficient) = match inequality.left.iter().next() {
        Some((term, coefficient)) => (term.clone(), *coefficient),
        None => return,
    };
    if coefficient == 1 {
        return;
    }
    checked_assume!(coefficient != 0);
    inequality.left.insert(term, 1);
    for value in inequality.right.values_mut() {
        *value /= coefficient;
    }
    if coefficient < 0 {
        inequality.kind = inequality.kind.flip();
    }
}

/// Cancels common terms between the two sides of a matched pair, then sweeps
/// out every zero-weight entry left over from normalization.
fn simplify_matching(left: &mut Terms, right: &mut Terms) {
    let common: Vec<ExprRef> = left
        .keys()
        .filter(|key| right.contains_key(*key))
        .cloned()
        .collect();
    for key in common {
        let l = left[&key];
        let r = right[&key];
        if l > r {
            left.insert(key.clone(), l - r);
            right.insert(key, 0);
        } else if l < r {
            right.insert(key.clone(), r - l);
            left.insert(key, 0);
        } else {
            left.insert(key.clone(), 0);
            right.insert(key, 0);
        }
    }
    left.retain(|_, coefficient| *coefficient != 0);
    right.retain(|_, coefficient| *coefficient != 0);
}

/// Rebuilds one side of an inequality from its coefficient map; an empty
/// side becomes the zero literal so the comparison stays well formed.
fn side_expr(terms: &Terms, width: Width) -> ExprRef {
    let mut result: Option<ExprRef> = None;
    for (term, coefficient) in terms {
        let piece = if term.is_constant() {
            Expr::constant(*coefficient as u64, term.width())
        } else if *coefficient == 1 {
            term.clone()
        } else {
            Expr::mul(
                term.clone(),
                Expr::constant(*coefficient as u64, term.width()),
            )
        };
        result = Some(match result {
            Some(acc) => Expr::add(acc, piece),
            None => piece,
        });
    }
    result.unwrap_or_else(|| Expr::constant(0, width))
}

fn reconstruct(atom: &FmAtom) -> ExprRef {
    match atom {
        FmAtom::Opaque(expr) => expr.clone(),
        FmAtom::Linear(inequality) => {
            let left = side_expr(&inequality.left, inequality.width);
            let right = side_expr(&inequality.right, inequality.width);
            match inequality.kind {
                BoundKind::Sle => Expr::sle(left, right),
                BoundKind::Slt => Expr::slt(left, right),
                BoundKind::Sge => Expr::sge(left, right),
                BoundKind::Sgt => Expr::sgt(left, right),
            }
        }
    }
}

fn linear_atom(expr: &ExprRef) -> Vec<FmAtom> {
    let (left, right) = match expr.binary_operands() {
        Some(operands) => operands,
        None => return vec![FmAtom::Opaque(expr.clone())],
    };
    let width = left.width();
    let kind = match &expr.kind {
        ExprKind::Sle { .. } => Some(BoundKind::Sle),
        ExprKind::Slt { .. } => Some(BoundKind::Slt),
        ExprKind::Sge { .. } => Some(BoundKind::Sge),
        ExprKind::Sgt { .. } => Some(BoundKind::Sgt),
        _ => None,
    };
    if let Some(kind) = kind {
        return vec![FmAtom::Linear(Inequality {
            left: coefficients(left),
            right: coefficients(right),
            kind,
            width,
        })];
    }
    if matches!(expr.kind, ExprKind::Eq { .. }) {
        let l = coefficients(left);
        let r = coefficients(right);
        return vec![
            FmAtom::Linear(Inequality {
                left: l.clone(),
                right: r.clone(),
                kind: BoundKind::Sle,
                width,
            }),
            FmAtom::Linear(Inequality {
                left: l,
                right: r,
                kind: BoundKind::Sge,
                width,
            }),
        ];
    }
    vec![FmAtom::Opaque(expr.clone())]
}

/// Projection-based elimination of the bound arrays from a conjunction of
/// linear atoms. Returns None when there is nothing to reconstruct, in which
/// case the caller keeps the original existential.
fn fourier_motzkin(
    bound: &[Rc<Array>],
    equality_atoms: &[ExprRef],
    interpolant_atoms: &[ExprRef],
) -> Option<ExprRef> {
    let mut atoms: Vec<FmAtom> = Vec::new();
    for equality in equality_atoms {
        atoms.extend(linear_atom(equality));
    }
    for atom in interpolant_atoms {
        atoms.extend(linear_atom(atom));
    }
    if atoms.len() > k_limits::MAX_FOURIER_MOTZKIN_ATOMS {
        trace!("elimination bailed out on {} atoms", atoms.len());
        return None;
    }

    for focus in bound {
        let mut uppers: Vec<Inequality> = Vec::new();
        let mut lowers: Vec<Inequality> = Vec::new();
        let mut rest: Vec<FmAtom> = Vec::new();
        for atom in atoms {
            match atom {
                FmAtom::Opaque(expr) => rest.push(FmAtom::Opaque(expr)),
                FmAtom::Linear(mut inequality) => {
                    let focus_on_left = normalize(focus, &mut inequality);
                    // Classification needs the focus alone on the left with a
                    // non-zero weight; dividing through is then always safe.
                    let lone_focus = inequality.left.len() == 1
                        && inequality
                            .left
                            .iter()
                            .all(|(term, coefficient)| {
                                is_focus_term(term, focus) && *coefficient != 0
                            });
                    if !focus_on_left || !lone_focus {
                        rest.push(FmAtom::Linear(inequality));
                        continue;
                    }
                    divide_through(&mut inequality);
                    if inequality.kind.is_upper() {
                        uppers.push(inequality);
                    } else {
                        lowers.push(inequality);
                    }
                }
            }
        }
        let mut matched: Vec<FmAtom> = Vec::new();
        for upper in &uppers {
            for lower in &lowers {
                let mut left = lower.right.clone();
                let mut right = upper.right.clone();
                simplify_matching(&mut left, &mut right);
                let strict = upper.kind.is_strict() || lower.kind.is_strict();
                matched.push(FmAtom::Linear(Inequality {
                    left,
                    right,
                    kind: if strict { BoundKind::Slt } else { BoundKind::Sle },
                    width: upper.width,
                }));
            }
        }
        matched.extend(rest);
        atoms = matched;
    }

    if atoms.is_empty() {
        return None;
    }
    let mut result: Option<ExprRef> = None;
    for atom in &atoms {
        result = Expr::conjoin(result, reconstruct(atom));
    }
    result
}

/// Simplifies an existentially quantified conjunction of an interpolant and
/// state equalities: equality folding, substitution of bound reads,
/// interpolant normalization, shape-based arithmetic substitution, and
/// elimination of the bound variables.
///
/// Anything that does not have the expected conjunction shape is returned
/// unchanged.
pub fn simplify_existential(exists: &ExprRef) -> ExprRef {
    let (bound, body) = match &exists.kind {
        ExprKind::Exists { bound, body } => (bound.clone(), body.clone()),
        _ => return exists.clone(),
    };
    if body.is_constant() {
        return body;
    }
    let (interpolant_part, equality_part) = match &body.kind {
        ExprKind::And { left, right } => (left.clone(), right.clone()),
        _ => return exists.clone(),
    };
    simplify_query(&bound, Some(interpolant_part), Some(equality_part))
}

/// The subsumption-check entry point: the interpolant and state-equality
/// conjuncts are kept apart so that an absent side cannot be mistaken for an
/// interpolant atom.
pub fn simplify_query(
    bound: &[Rc<Array>],
    interpolant: Option<ExprRef>,
    equalities: Option<ExprRef>,
) -> ExprRef {
    let bound = bound.to_vec();
    let interpolant_part = interpolant.unwrap_or_else(|| Expr::bool_constant(true));
    let equality_part = equalities.unwrap_or_else(|| Expr::bool_constant(true));
    let fallback = Expr::exists(
        bound.clone(),
        Expr::and(interpolant_part.clone(), equality_part.clone()),
    );
    // A disjunctive equality side is a single clause of a CNF formula coming
    // from a merged state; nothing is simplified in that case.
    if matches!(equality_part.kind, ExprKind::Or { .. }) {
        return fallback;
    }

    let mut equality_pack = Vec::new();
    let full_equality = simplify_equality_expr(&mut equality_pack, &equality_part);
    if full_equality.is_false() {
        return full_equality;
    }

    // Substitute away bound reads that the equalities pin directly.
    let mut substitution: HashMap<ExprRef, ExprRef> = HashMap::new();
    for equality in &equality_pack {
        if let ExprKind::Eq { left, right } = &equality.kind {
            if is_bound_read(&bound, left) && !has_existentials(&bound, right) {
                substitution.entry(left.clone()).or_insert_with(|| right.clone());
            }
        }
    }
    let substituted = if substitution.is_empty() {
        interpolant_part
    } else {
        substitute_all(&interpolant_part, &substitution)
    };

    let mut interpolant_pack = Vec::new();
    let simplified_interpolant = simplify_interpolant_expr(&mut interpolant_pack, &substituted);
    if simplified_interpolant.is_constant() {
        // The equalities then relate constants and state symbols only.
        return full_equality;
    }

    // Arithmetic substitution: when an equality lhs structurally contains an
    // atom's lhs, rewrite the atom against the equality's rhs. The shape
    // comparison is deliberately left as-is.
    let mut new_interpolant: Option<ExprRef> = None;
    for atom in &interpolant_pack {
        let mut atom = atom.clone();
        for equality in &equality_pack {
            if equality.is_false() {
                return Expr::bool_constant(false);
            }
            if equality.is_true() {
                return Expr::bool_constant(true);
            }
            let (equality_left, equality_right) = match equality.binary_operands() {
                Some(operands) => (operands.0.clone(), operands.1.clone()),
                None => continue,
            };
            let atom_operands = match atom.binary_operands() {
                Some(operands) => (operands.0.clone(), operands.1.clone()),
                None => continue,
            };
            if contains_shadow_expr(&equality_left, &atom_operands.0) {
                let new_left = equality_right;
                let new_right = if equality_left.binary_operands().is_none() {
                    atom_operands.1
                } else {
                    replace_expr(&equality_left, &atom_operands.0, &atom_operands.1)
                };
                atom = Expr::binary_of_same_kind(&atom, new_left, new_right);
            }
        }
        new_interpolant = Expr::conjoin(new_interpolant, atom);
    }

    let final_atoms: Vec<ExprRef> = match &new_interpolant {
        Some(interpolant) => {
            if !has_existentials(&bound, interpolant) {
                return interpolant.clone();
            }
            let mut pack = Vec::new();
            simplify_interpolant_expr(&mut pack, interpolant);
            pack
        }
        None => interpolant_pack,
    };

    let eliminated = fourier_motzkin(&bound, &equality_pack, &final_atoms);
    let result = match eliminated {
        Some(result) => result,
        None => return fallback,
    };
    let remaining: Vec<Rc<Array>> = bound
        .iter()
        .filter(|array| result.mentions_any_array(std::slice::from_ref(array)))
        .cloned()
        .collect();
    if remaining.is_empty() {
        result
    } else {
        Expr::exists(remaining, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> ExprRef {
        let array = Array::new(name.to_string(), 4, 32, 8);
        Expr::read(array, None, Expr::constant(0, 32))
    }

    #[test]
    fn coefficients_of_linear_sums() {
        let x = sym("x");
        let y = sym("y");
        let expr = Expr::add(x.clone(), Expr::sub(y.clone(), Expr::constant(3, 8)));
        let map = coefficients(&expr);
        assert_eq!(map.get(&x), Some(&1));
        assert_eq!(map.get(&y), Some(&1));
        assert_eq!(map.get(&Expr::constant(0, 8)), Some(&-3));
    }

    #[test]
    fn negation_of_wrapped_comparisons() {
        let a = sym("a");
        let b = sym("b");
        let cmp = Expr::slt(a.clone(), b.clone());
        assert_eq!(negate_comparison(&cmp), Some(Expr::sge(a, b)));
    }

    #[test]
    fn matching_cancels_shared_terms() {
        let y = sym("y");
        let mut left = Terms::new();
        left.insert(y.clone(), 1);
        left.insert(Expr::constant(0, 8), -1);
        let mut right = Terms::new();
        right.insert(y, 1);
        right.insert(Expr::constant(0, 8), 1);
        simplify_matching(&mut left, &mut right);
        assert!(left.is_empty());
        assert_eq!(right.get(&Expr::constant(0, 8)), Some(&2));
    }
}
