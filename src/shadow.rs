// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::expression::{Array, Expr, ExprKind, ExprRef, UpdateList, UpdateNode};

use log::trace;
use std::collections::HashMap;
use std::rc::Rc;

/// The registry of shadow arrays used to existentially generalize
/// interpolants. Every source array maps to exactly one shadow counterpart;
/// the mapping is monotonic and never rebound.
///
/// With `no_existential` set, renaming is the identity and no replacement is
/// ever recorded, producing weaker but quantifier-free interpolants.
#[derive(Debug, Default)]
pub struct ShadowArrays {
    map: HashMap<u64, Rc<Array>>,
    no_existential: bool,
}

impl ShadowArrays {
    pub fn new(no_existential: bool) -> ShadowArrays {
        ShadowArrays {
            map: HashMap::new(),
            no_existential,
        }
    }

    /// The shadow counterpart of `source`, created on first use. A freshly
    /// created shadow is appended to `replacements` for use as an existential
    /// binder by the caller.
    fn shadow_of(&mut self, source: &Rc<Array>, replacements: &mut Vec<Rc<Array>>) -> Rc<Array> {
        if let Some(existing) = self.map.get(&source.id()) {
            if !replacements.iter().any(|a| Rc::ptr_eq(a, existing)) {
                replacements.push(existing.clone());
            }
            return existing.clone();
        }
        let shadow = Array::new(
            format!("{}__shadow", source.name),
            source.size,
            source.domain_width,
            source.range_width,
        );
        trace!("new shadow array {:?} for {:?}", shadow, source);
        self.map.insert(source.id(), shadow.clone());
        replacements.push(shadow.clone());
        shadow
    }

    fn shadow_updates(
        &mut self,
        updates: &UpdateList,
        replacements: &mut Vec<Rc<Array>>,
    ) -> UpdateList {
        updates.as_ref().map(|node| {
            Rc::new(UpdateNode {
                index: self.shadow_expression(&node.index, replacements),
                value: self.shadow_expression(&node.value, replacements),
                next: self.shadow_updates(&node.next, replacements),
            })
        })
    }

    /// Rebuilds `expr` with every array symbol replaced by its shadow
    /// counterpart. Constants are returned unchanged; every other node is
    /// rebuilt from shadowed children.
    pub fn shadow_expression(
        &mut self,
        expr: &ExprRef,
        replacements: &mut Vec<Rc<Array>>,
    ) -> ExprRef {
        if self.no_existential {
            return expr.clone();
        }
        use self::ExprKind::*;
        match &expr.kind {
            Constant { .. } => expr.clone(),
            Read {
                root,
                updates,
                index,
            } => {
                let shadow_root = self.shadow_of(root, replacements);
                let shadow_updates = self.shadow_updates(updates, replacements);
                let shadow_index = self.shadow_expression(index, replacements);
                Expr::read(shadow_root, shadow_updates, shadow_index)
            }
            Concat { left, right } => Expr::concat(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            Extract {
                expr: operand,
                offset,
                width,
            } => Expr::extract(
                self.shadow_expression(operand, replacements),
                *offset,
                *width,
            ),
            ZExt {
                expr: operand,
                width,
            } => Expr::zext(self.shadow_expression(operand, replacements), *width),
            SExt {
                expr: operand,
                width,
            } => Expr::sext(self.shadow_expression(operand, replacements), *width),
            Add { left, right } => Expr::add(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            Sub { left, right } => Expr::sub(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            Mul { left, right } => Expr::mul(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            UDiv { left, right } => Expr::udiv(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            SDiv { left, right } => Expr::sdiv(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            URem { left, right } => Expr::urem(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            SRem { left, right } => Expr::srem(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            Not { operand } => Expr::not(self.shadow_expression(operand, replacements)),
            And { left, right } => Expr::and(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            Or { left, right } => Expr::or(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            Xor { left, right } => Expr::xor(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            Shl { left, right } => Expr::shl(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            LShr { left, right } => Expr::lshr(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            AShr { left, right } => Expr::ashr(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            Eq { left, right } => Expr::equals(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            Ne { left, right } => Expr::not_equals(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            Ult { left, right } => Expr::ult(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            Ule { left, right } => Expr::ule(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            Ugt { left, right } => Expr::ugt(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            Uge { left, right } => Expr::uge(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            Slt { left, right } => Expr::slt(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            Sle { left, right } => Expr::sle(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            Sgt { left, right } => Expr::sgt(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            Sge { left, right } => Expr::sge(
                self.shadow_expression(left, replacements),
                self.shadow_expression(right, replacements),
            ),
            Select {
                condition,
                consequent,
                alternate,
            } => Expr::select(
                self.shadow_expression(condition, replacements),
                self.shadow_expression(consequent, replacements),
                self.shadow_expression(alternate, replacements),
            ),
            Exists { bound, body } => Expr::exists(
                bound.clone(),
                self.shadow_expression(body, replacements),
            ),
        }
    }
}
