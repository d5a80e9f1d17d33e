// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::allocation_graph::AllocationGraph;
use crate::dependency::Dependency;
use crate::expression::{Array, Expr, ExprKind, ExprRef};
use crate::ir::IrValue;
use crate::path_condition::{PathConditionFrame, PathConditions};
use crate::shadow::ShadowArrays;
use crate::simplification;
use crate::solver::{SmtResult, SubsumptionSolver};
use crate::stats::SubsumptionStats;

use itertools::Itertools;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Debug as FmtDebug, Formatter, Result as FmtResult};
use std::rc::Rc;

/// Everything the subsumption check needs to know about the current state:
/// the unshadowed store snapshots, the constraint-to-frame markers, the
/// node's dependency context, and the path constraints handed to the solver.
pub(crate) struct CheckContext<'a> {
    pub state_singleton: &'a HashMap<Rc<IrValue>, ExprRef>,
    pub state_composite: &'a HashMap<Rc<IrValue>, Vec<ExprRef>>,
    pub markers: &'a HashMap<ExprRef, Rc<PathConditionFrame>>,
    pub dependency: &'a Rc<Dependency>,
    pub constraints: &'a [ExprRef],
    pub timeout: f64,
}

/// One tabled interpolant: the packed path-condition interpolant, the core
/// store snapshots per allocation site, and the shadow arrays to quantify
/// over. Immutable after construction.
#[derive(Serialize, Deserialize, Clone)]
pub struct SubsumptionTableEntry {
    pub node_id: u64,
    pub interpolant: Option<ExprRef>,
    pub singleton_store: Vec<(Rc<IrValue>, ExprRef)>,
    pub composite_store: Vec<(Rc<IrValue>, Vec<ExprRef>)>,
    pub existentials: Vec<Rc<Array>>,
}

impl SubsumptionTableEntry {
    /// Snapshots a finished node. The store snapshots come from the parent's
    /// dependency because the program point indexing the table is the first
    /// instruction of a basic block.
    pub fn new(
        node_id: u64,
        path_condition: &PathConditions,
        parent_dependency: Option<&Rc<Dependency>>,
        shadows: &mut ShadowArrays,
    ) -> SubsumptionTableEntry {
        let mut replacements: Vec<Rc<Array>> = Vec::new();
        let interpolant = path_condition.pack_interpolant(shadows, &mut replacements);
        let (singleton_store, composite_store) = match parent_dependency {
            Some(dependency) => {
                let singletons = dependency
                    .latest_core_expressions(shadows, &mut replacements, true)
                    .into_iter()
                    .sorted_by_key(|(site, _)| site.id())
                    .collect();
                let composites = dependency
                    .composite_core_expressions(shadows, &mut replacements, true)
                    .into_iter()
                    .sorted_by_key(|(site, _)| site.id())
                    .collect();
                (singletons, composites)
            }
            None => (Vec::new(), Vec::new()),
        };
        SubsumptionTableEntry {
            node_id,
            interpolant,
            singleton_store,
            composite_store,
            existentials: replacements,
        }
    }

    /// An empty entry constrains nothing and subsumes every state at its
    /// program point.
    pub fn is_empty(&self) -> bool {
        self.interpolant.is_none()
            && self.singleton_store.is_empty()
            && self.composite_store.is_empty()
    }

    /// Bridges a width mismatch by zero-extending the narrower side.
    fn bridged_equality(lhs: &ExprRef, rhs: &ExprRef) -> ExprRef {
        let (lhs, rhs) = if lhs.width() < rhs.width() {
            (Expr::zext(lhs.clone(), rhs.width()), rhs.clone())
        } else if rhs.width() < lhs.width() {
            (lhs.clone(), Expr::zext(rhs.clone(), lhs.width()))
        } else {
            (lhs.clone(), rhs.clone())
        };
        Expr::equals(lhs, rhs)
    }

    /// The conjunction of pointwise store equalities between this entry and
    /// the current state. None means the entry cannot match at all.
    fn state_equality_constraints(&self, context: &CheckContext<'_>) -> Option<Option<ExprRef>> {
        let mut state_equalities: Option<ExprRef> = None;
        for (site, expr) in self.singleton_store.iter() {
            let state_expr = match context.state_singleton.get(site) {
                Some(state_expr) => state_expr,
                // The state never versioned this site; the entry cannot
                // describe it.
                None => return None,
            };
            let equality = SubsumptionTableEntry::bridged_equality(expr, state_expr);
            if equality.is_false() {
                return None;
            }
            if equality.is_true() {
                continue;
            }
            state_equalities = Expr::conjoin(state_equalities, equality);
        }
        for (site, exprs) in self.composite_store.iter() {
            let state_exprs = match context.state_composite.get(site) {
                Some(state_exprs) => state_exprs,
                None => return None,
            };
            let mut disjunction: Option<ExprRef> = None;
            let mut trivially_true = false;
            'product: for lhs in exprs.iter() {
                for rhs in state_exprs.iter() {
                    let equality = SubsumptionTableEntry::bridged_equality(lhs, rhs);
                    if equality.is_true() {
                        trivially_true = true;
                        break 'product;
                    }
                    disjunction = match disjunction {
                        Some(acc) => Some(Expr::or(equality, acc)),
                        None => Some(equality),
                    };
                }
            }
            if trivially_true {
                continue;
            }
            match disjunction {
                Some(disjunction) => {
                    if disjunction.is_false() {
                        return None;
                    }
                    state_equalities = Expr::conjoin(state_equalities, disjunction);
                }
                None => return None,
            }
        }
        Some(state_equalities)
    }

    /// Decides whether this entry subsumes the current state: builds the
    /// implication query, simplifies it when existentials are present, asks
    /// the solver, and on success marks the unsat-core frames and the core
    /// allocations.
    pub(crate) fn subsumed(
        &self,
        solver: &mut dyn SubsumptionSolver,
        context: &CheckContext<'_>,
        stats: &mut SubsumptionStats,
    ) -> bool {
        if self.is_empty() {
            return true;
        }
        let state_equalities = match self.state_equality_constraints(context) {
            Some(state_equalities) => state_equalities,
            None => return false,
        };
        if self.interpolant.is_none() && state_equalities.is_none() {
            // Both sides degenerated to true, so everything is subsumed.
            return true;
        }

        let query = if self.existentials.is_empty() {
            match Expr::conjoin(self.interpolant.clone(), {
                match &state_equalities {
                    Some(eq) => eq.clone(),
                    None => Expr::bool_constant(true),
                }
            }) {
                Some(query) => query,
                None => return true,
            }
        } else {
            simplification::simplify_query(
                &self.existentials,
                self.interpolant.clone(),
                state_equalities,
            )
        };
        trace!("subsumption query {:?}", query);

        if query.is_constant() {
            return query.is_true();
        }

        let quantified = matches!(query.kind, ExprKind::Exists { .. });
        solver.set_core_solver_timeout(context.timeout);
        let result = if quantified {
            // Quantified queries bypass any pre-solving optimization that
            // assumes quantifier-free input.
            solver.direct_compute_validity(context.constraints, &query)
        } else {
            solver.evaluate(context.constraints, &query)
        };
        solver.set_core_solver_timeout(0.0);

        match result {
            SmtResult::Valid => {
                debug!("solver decided validity at {}", self.node_id);
                let unsat_core = solver.get_unsat_core();
                let mut staged: Vec<Rc<PathConditionFrame>> = Vec::new();
                for clause in unsat_core.iter() {
                    // Core clauses that are not in the path condition can
                    // arise from merged states; they are skipped.
                    if let Some(frame) = context.markers.get(clause) {
                        if !staged.iter().any(|f| Rc::ptr_eq(f, frame)) {
                            staged.push(frame.clone());
                        }
                    }
                }
                let mut graph = AllocationGraph::new();
                for frame in staged {
                    frame.include_in_interpolant(&mut graph, context.dependency);
                }
                context.dependency.compute_core_allocations(&mut graph);
                true
            }
            SmtResult::Invalid => false,
            SmtResult::Undefined => {
                stats.solver_failures += 1;
                false
            }
        }
    }
}

impl FmtDebug for SubsumptionTableEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "------------ Subsumption Table Entry ------------")?;
        writeln!(f, "Program point = {}", self.node_id)?;
        match &self.interpolant {
            Some(interpolant) => writeln!(f, "interpolant = {:?}", interpolant)?,
            None => writeln!(f, "interpolant = (empty)")?,
        }
        if !self.singleton_store.is_empty() {
            writeln!(f, "singleton allocations = {:?}", self.singleton_store)?;
        }
        if !self.composite_store.is_empty() {
            writeln!(f, "composite allocations = {:?}", self.composite_store)?;
        }
        if !self.existentials.is_empty() {
            let names: Vec<&str> = self.existentials.iter().map(|a| a.name.as_str()).collect();
            writeln!(f, "existentials = {:?}", names)?;
        }
        Ok(())
    }
}

/// The per-program-point store of table entries. Entries are append-only;
/// nothing is ever evicted or rewritten.
#[derive(Default)]
pub struct SubsumptionTable {
    entries: HashMap<u64, Vec<SubsumptionTableEntry>>,
}

impl SubsumptionTable {
    pub fn new() -> SubsumptionTable {
        SubsumptionTable {
            entries: HashMap::new(),
        }
    }

    pub fn store(&mut self, entry: SubsumptionTableEntry) {
        trace!("storing table entry {:?}", entry);
        self.entries
            .entry(entry.node_id)
            .or_insert_with(Vec::new)
            .push(entry);
    }

    pub fn entries_for(&self, node_id: u64) -> &[SubsumptionTableEntry] {
        self.entries
            .get(&node_id)
            .map(|bucket| bucket.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(|bucket| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FmtDebug for SubsumptionTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for bucket in self.entries.values() {
            for entry in bucket {
                entry.fmt(f)?;
            }
        }
        Ok(())
    }
}
