// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::allocation_graph::AllocationGraph;
use crate::dependency::{Dependency, VersionedValue};
use crate::expression::{Array, Expr, ExprKind, ExprRef};
use crate::shadow::ShadowArrays;

use log::trace;
use rpds::List;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result};
use std::rc::Rc;

/// One frame of the path condition: a constraint added by a branch decision,
/// the versioned value of the branch condition it came from, and the core
/// bookkeeping used when interpolants are packed.
///
/// The shadow-renamed constraint is cached after the first packing together
/// with the bound arrays that renaming introduced; later packings re-donate
/// the recorded binders instead of renaming again.
pub struct PathConditionFrame {
    constraint: ExprRef,
    condition: Option<Rc<VersionedValue>>,
    depth: u64,
    in_core: Cell<bool>,
    shadow: RefCell<Option<ExprRef>>,
    bound: RefCell<Vec<Rc<Array>>>,
}

impl PathConditionFrame {
    pub fn new(
        constraint: ExprRef,
        condition: Option<Rc<VersionedValue>>,
        depth: u64,
    ) -> Rc<PathConditionFrame> {
        Rc::new(PathConditionFrame {
            constraint,
            condition,
            depth,
            in_core: Cell::new(false),
            shadow: RefCell::new(None),
            bound: RefCell::new(Vec::new()),
        })
    }

    pub fn constraint(&self) -> &ExprRef {
        &self.constraint
    }

    pub fn depth(&self) -> u64 {
        self.depth
    }

    pub fn is_in_core(&self) -> bool {
        self.in_core.get()
    }

    /// True when the unsat-core clause names this frame. A disjunctive frame
    /// also answers to either of its disjuncts; such constraints arise from
    /// merged states and are indexed by their components.
    pub fn matches(&self, clause: &ExprRef) -> bool {
        if self.constraint == *clause {
            return true;
        }
        if let ExprKind::Or { left, right } = &self.constraint.kind {
            return *left == *clause || *right == *clause;
        }
        false
    }

    /// Marks this frame as part of the interpolant and floods the dependency
    /// context from the linked condition value.
    pub fn include_in_interpolant(&self, graph: &mut AllocationGraph, dependency: &Dependency) {
        if let Some(condition) = &self.condition {
            dependency.mark_all_values(graph, condition);
        }
        self.in_core.set(true);
    }

    /// The shadow-renamed constraint for table-entry use; renames on first
    /// call and replays the recorded binders afterwards.
    fn packed_constraint(
        &self,
        shadows: &mut ShadowArrays,
        replacements: &mut Vec<Rc<Array>>,
    ) -> ExprRef {
        if let Some(cached) = &*self.shadow.borrow() {
            for array in self.bound.borrow().iter() {
                if !replacements.iter().any(|a| Rc::ptr_eq(a, array)) {
                    replacements.push(array.clone());
                }
            }
            return cached.clone();
        }
        let mut introduced = Vec::new();
        let renamed = shadows.shadow_expression(&self.constraint, &mut introduced);
        *self.shadow.borrow_mut() = Some(renamed.clone());
        *self.bound.borrow_mut() = introduced.clone();
        for array in introduced {
            if !replacements.iter().any(|a| Rc::ptr_eq(a, &array)) {
                replacements.push(array);
            }
        }
        renamed
    }
}

impl Debug for PathConditionFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "{:?}@{}: {}",
            self.constraint,
            self.depth,
            if self.is_in_core() {
                "interpolant constraint"
            } else {
                "non-interpolant constraint"
            }
        )
    }
}

/// The path condition of one tree node: a cons list of frames shared
/// structurally with ancestors. A child created at a split starts from its
/// parent's list, so the frames between a node's head and its parent's head
/// are reclaimed exactly when the node goes away.
#[derive(Clone)]
pub struct PathConditions {
    frames: List<Rc<PathConditionFrame>>,
}

impl Default for PathConditions {
    fn default() -> PathConditions {
        PathConditions::empty()
    }
}

impl PathConditions {
    pub fn empty() -> PathConditions {
        PathConditions { frames: List::new() }
    }

    pub fn push(&self, frame: Rc<PathConditionFrame>) -> PathConditions {
        PathConditions {
            frames: self.frames.push_front(frame),
        }
    }

    /// Newest frame first.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<PathConditionFrame>> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Conjoins the shadow-renamed constraints of all core frames, newest
    /// first. Returns None when no frame is in the core.
    pub fn pack_interpolant(
        &self,
        shadows: &mut ShadowArrays,
        replacements: &mut Vec<Rc<Array>>,
    ) -> Option<ExprRef> {
        let mut result: Option<ExprRef> = None;
        for frame in self.iter() {
            if frame.is_in_core() {
                let renamed = frame.packed_constraint(shadows, replacements);
                result = Expr::conjoin(result, renamed);
            }
        }
        trace!("packed interpolant {:?}", result);
        result
    }

    /// A map from constraint (and, for disjunctions, each disjunct) to the
    /// newest frame carrying it, used to translate unsat-core clauses back to
    /// frames.
    pub fn marker_map(&self) -> HashMap<ExprRef, Rc<PathConditionFrame>> {
        let mut result: HashMap<ExprRef, Rc<PathConditionFrame>> = HashMap::new();
        for frame in self.iter() {
            result
                .entry(frame.constraint().clone())
                .or_insert_with(|| frame.clone());
            if let ExprKind::Or { left, right } = &frame.constraint().kind {
                result.entry(left.clone()).or_insert_with(|| frame.clone());
                result.entry(right.clone()).or_insert_with(|| frame.clone());
            }
        }
        result
    }
}

impl Debug for PathConditions {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Array;

    fn sym(name: &str) -> ExprRef {
        let array = Array::new(name.to_string(), 4, 32, 8);
        Expr::read(array, None, Expr::constant(0, 32))
    }

    fn frame(constraint: ExprRef) -> Rc<PathConditionFrame> {
        PathConditionFrame::new(constraint, None, 0)
    }

    #[test]
    fn child_lists_share_parent_frames() {
        let parent = PathConditions::empty()
            .push(frame(Expr::sgt(sym("a"), Expr::constant(0, 8))));
        let child = parent.push(frame(Expr::slt(sym("b"), Expr::constant(0, 8))));
        assert_eq!(parent.len(), 1);
        assert_eq!(child.len(), 2);
        // Dropping the child must leave the shared frame alive.
        let shared = parent.iter().next().unwrap().clone();
        drop(child);
        assert!(Rc::strong_count(&shared) >= 2);
        assert_eq!(parent.len(), 1);
    }

    #[test]
    fn disjunctive_frames_match_either_disjunct() {
        let lhs = Expr::sgt(sym("a"), Expr::constant(0, 8));
        let rhs = Expr::slt(sym("b"), Expr::constant(0, 8));
        let or = Expr::or(lhs.clone(), rhs.clone());
        let f = frame(or.clone());
        assert!(f.matches(&or));
        assert!(f.matches(&lhs));
        assert!(f.matches(&rhs));
        assert!(!f.matches(&Expr::bool_constant(true)));
    }

    #[test]
    fn packing_caches_the_shadow_and_replays_binders() {
        let mut shadows = ShadowArrays::new(false);
        let constraint = Expr::sgt(sym("x"), Expr::constant(0, 8));
        let f = frame(constraint);
        let mut graph = AllocationGraph::new();
        let dependency = Dependency::new(None);
        f.include_in_interpolant(&mut graph, &dependency);
        let pcs = PathConditions::empty().push(f);

        let mut first_replacements = Vec::new();
        let first = pcs
            .pack_interpolant(&mut shadows, &mut first_replacements)
            .unwrap();
        assert_eq!(first_replacements.len(), 1);

        let mut second_replacements = Vec::new();
        let second = pcs
            .pack_interpolant(&mut shadows, &mut second_replacements)
            .unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second_replacements.len(), 1);
        assert!(Rc::ptr_eq(&first_replacements[0], &second_replacements[0]));
    }

    #[test]
    fn only_core_frames_are_packed() {
        let mut shadows = ShadowArrays::new(false);
        let core = frame(Expr::sgt(sym("p"), Expr::constant(0, 8)));
        let mut graph = AllocationGraph::new();
        let dependency = Dependency::new(None);
        core.include_in_interpolant(&mut graph, &dependency);
        let pcs = PathConditions::empty()
            .push(core)
            .push(frame(Expr::slt(sym("q"), Expr::constant(0, 8))));
        let mut replacements = Vec::new();
        let packed = pcs.pack_interpolant(&mut shadows, &mut replacements);
        assert!(packed.is_some());
        // Only the core frame's array was renamed.
        assert_eq!(replacements.len(), 1);
    }
}
