// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::allocation_graph::AllocationGraph;
use crate::dependency::Dependency;
use crate::expression::ExprRef;
use crate::ir::{Instruction, IrValue};
use crate::options::Options;
use crate::path_condition::{PathConditionFrame, PathConditions};
use crate::shadow::ShadowArrays;
use crate::solver::SubsumptionSolver;
use crate::stats::SubsumptionStats;
use crate::subsumption::{CheckContext, SubsumptionTable, SubsumptionTableEntry};
use crate::tree_dump::SearchTree;

use log::{debug, trace};
use mirai_annotations::*;
use std::rc::Rc;

/// A handle into the tree's node arena. Handles are never reused within one
/// tree, so a stale handle is an executor-contract violation rather than a
/// silent aliasing bug.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct NodeRef(usize);

/// One node of the interpolation tree. It owns its dependency context and
/// the path-condition frames above its parent's head; the cons list shares
/// the rest with its ancestors.
pub struct ITreeNode {
    parent: Option<NodeRef>,
    left: Option<NodeRef>,
    right: Option<NodeRef>,
    /// The program point of the first instruction executed at this node;
    /// zero until the first visit.
    node_id: u64,
    is_subsumed: bool,
    depth: u64,
    path_condition: PathConditions,
    dependency: Rc<Dependency>,
}

impl ITreeNode {
    fn new(parent: Option<NodeRef>, depth: u64, path_condition: PathConditions, dependency: Rc<Dependency>) -> ITreeNode {
        ITreeNode {
            parent,
            left: None,
            right: None,
            node_id: 0,
            is_subsumed: false,
            depth,
            path_condition,
            dependency,
        }
    }

    pub fn node_id(&self) -> u64 {
        self.node_id
    }

    pub fn is_subsumed(&self) -> bool {
        self.is_subsumed
    }

    pub fn path_condition(&self) -> &PathConditions {
        &self.path_condition
    }

    pub fn dependency(&self) -> &Rc<Dependency> {
        &self.dependency
    }
}

/// The interpolation tree: the explored state space of the symbolic run.
/// The executor drives it through `execute`, `add_constraint`, `split`,
/// `set_current_node`, the subsumption check, and `remove` on termination.
///
/// When interpolation is switched off every operation is a no-op (splits
/// still produce nodes so the executor's bookkeeping stays uniform).
pub struct ITree {
    nodes: Vec<Option<ITreeNode>>,
    root: NodeRef,
    current: NodeRef,
    table: SubsumptionTable,
    shadows: ShadowArrays,
    interpolation: bool,
    stats: SubsumptionStats,
    search_tree: Option<SearchTree>,
}

impl ITree {
    pub fn new(options: &Options) -> ITree {
        let root_node = ITreeNode::new(None, 0, PathConditions::empty(), Dependency::new(None));
        let root = NodeRef(0);
        ITree {
            nodes: vec![Some(root_node)],
            root,
            current: root,
            table: SubsumptionTable::new(),
            shadows: ShadowArrays::new(options.no_existential),
            interpolation: options.interpolation,
            stats: SubsumptionStats::default(),
            search_tree: if options.output_interpolation_tree {
                Some(SearchTree::new())
            } else {
                None
            },
        }
    }

    pub fn root(&self) -> NodeRef {
        self.root
    }

    pub fn current_node(&self) -> NodeRef {
        self.current
    }

    fn node(&self, node: NodeRef) -> &ITreeNode {
        self.nodes[node.0]
            .as_ref()
            .unwrap_or_else(|| assume_unreachable!("stale node handle {:?}", node))
    }

    fn node_mut(&mut self, node: NodeRef) -> &mut ITreeNode {
        self.nodes[node.0]
            .as_mut()
            .unwrap_or_else(|| assume_unreachable!("stale node handle {:?}", node))
    }

    pub fn node_data(&self, node: NodeRef) -> &ITreeNode {
        self.node(node)
    }

    /// Makes `node` the active node and pins its program point on the first
    /// visit.
    pub fn set_current_node(&mut self, node: NodeRef, program_point: u64) {
        if !self.interpolation {
            return;
        }
        self.current = node;
        if self.node(node).node_id == 0 {
            self.node_mut(node).node_id = program_point;
            if let Some(search_tree) = &mut self.search_tree {
                search_tree.record_program_point(node.0, program_point);
            }
        }
    }

    /// Routes one executed instruction into the current dependency context.
    pub fn execute(&mut self, instr: &Rc<Instruction>, args: &[ExprRef]) {
        if !self.interpolation {
            return;
        }
        let current = self.current;
        self.node(current).dependency.execute(instr, args);
    }

    /// Pushes a path-condition frame for a decided branch. The condition
    /// value links the constraint to the dependency context so unsat-core
    /// marking can flood from it.
    pub fn add_constraint(&mut self, constraint: ExprRef, condition: Option<&Rc<IrValue>>) {
        if !self.interpolation {
            return;
        }
        let current = self.current;
        let node = self.node(current);
        let condition_value = condition.and_then(|value| node.dependency.get_latest_value(value));
        let frame = PathConditionFrame::new(constraint, condition_value, node.depth);
        trace!("new path condition frame {:?}", frame);
        let extended = node.path_condition.push(frame);
        self.node_mut(current).path_condition = extended;
    }

    /// Forks the given node. Both children inherit the parent's
    /// path-condition head and get a fresh dependency context chained to the
    /// parent's.
    pub fn split(&mut self, parent: NodeRef) -> (NodeRef, NodeRef) {
        let (path_condition, dependency, depth) = {
            let parent_node = self.node(parent);
            precondition!(
                parent_node.left.is_none() && parent_node.right.is_none(),
                "node forked twice"
            );
            (
                parent_node.path_condition.clone(),
                parent_node.dependency.clone(),
                parent_node.depth,
            )
        };
        let left = NodeRef(self.nodes.len());
        self.nodes.push(Some(ITreeNode::new(
            Some(parent),
            depth + 1,
            path_condition.clone(),
            Dependency::new(Some(dependency.clone())),
        )));
        let right = NodeRef(self.nodes.len());
        self.nodes.push(Some(ITreeNode::new(
            Some(parent),
            depth + 1,
            path_condition,
            Dependency::new(Some(dependency)),
        )));
        {
            let parent_node = self.node_mut(parent);
            parent_node.left = Some(left);
            parent_node.right = Some(right);
        }
        if let Some(search_tree) = &mut self.search_tree {
            search_tree.record_split(parent.0, left.0, right.0);
        }
        debug!("split {:?} into {:?}, {:?}", parent, left, right);
        (left, right)
    }

    /// Removes a terminated leaf. A node that was not subsumed deposits a
    /// table entry first; ancestors that just lost their second child are
    /// removed along the way.
    pub fn remove(&mut self, node: NodeRef) {
        let mut node = Some(node);
        while let Some(current) = node {
            {
                let data = self.node(current);
                precondition!(
                    data.left.is_none() && data.right.is_none(),
                    "only leaves can be removed"
                );
            }
            let data = self.nodes[current.0]
                .take()
                .unwrap_or_else(|| assume_unreachable!("stale node handle {:?}", current));
            if !data.is_subsumed && self.interpolation {
                // The node has been completely traversed; this is the moment
                // its interpolant is tabled.
                let parent_dependency = data
                    .parent
                    .map(|parent| self.node(parent).dependency.clone());
                let entry = SubsumptionTableEntry::new(
                    data.node_id,
                    &data.path_condition,
                    parent_dependency.as_ref(),
                    &mut self.shadows,
                );
                self.table.store(entry);
                self.stats.entries_stored += 1;
            }
            let parent = data.parent;
            node = None;
            if let Some(parent) = parent {
                let parent_node = self.node_mut(parent);
                if parent_node.left == Some(current) {
                    parent_node.left = None;
                } else {
                    verify!(parent_node.right == Some(current));
                    parent_node.right = None;
                }
                if parent_node.left.is_none() && parent_node.right.is_none() {
                    node = Some(parent);
                }
            }
        }
    }

    /// Checks the current state against the tabled entries for its program
    /// point. On success the current node is flagged so that its own removal
    /// will not deposit a weaker duplicate entry.
    pub fn check_current_state_subsumption(
        &mut self,
        solver: &mut dyn SubsumptionSolver,
        program_point: u64,
        constraints: &[ExprRef],
        timeout: f64,
    ) -> bool {
        if !self.interpolation {
            return false;
        }
        let current = self.current;
        // Subsumption only runs at basic-block heads: the state must sit
        // exactly at the instruction that named this node.
        if self.node(current).node_id == 0 || self.node(current).node_id != program_point {
            return false;
        }
        let (state_singleton, state_composite) = {
            let node = self.node(current);
            match node.parent {
                Some(parent) => {
                    let dependency = self.node(parent).dependency.clone();
                    let mut ignored = Vec::new();
                    (
                        dependency.latest_core_expressions(&mut self.shadows, &mut ignored, false),
                        dependency.composite_core_expressions(
                            &mut self.shadows,
                            &mut ignored,
                            false,
                        ),
                    )
                }
                None => Default::default(),
            }
        };
        let markers = self.node(current).path_condition.marker_map();
        let dependency = self.node(current).dependency.clone();
        let mut subsumed = false;
        for entry in self.table.entries_for(program_point) {
            self.stats.checks += 1;
            let context = CheckContext {
                state_singleton: &state_singleton,
                state_composite: &state_composite,
                markers: &markers,
                dependency: &dependency,
                constraints,
                timeout,
            };
            if entry.subsumed(solver, &context, &mut self.stats) {
                subsumed = true;
                break;
            }
        }
        if subsumed {
            // The table already contains an entry at least as general as
            // this state; do not table it again on removal.
            self.node_mut(current).is_subsumed = true;
            self.stats.subsumptions += 1;
            if let Some(search_tree) = &mut self.search_tree {
                search_tree.record_subsumption(current.0, program_point);
            }
        }
        subsumed
    }

    /// Marks the path-condition frames named by the solver's unsat core
    /// after an infeasibility, flood-filling the dependency context and
    /// recording the core allocations.
    ///
    /// The core list arrives in assertion (oldest-first) order while frames
    /// are newest-first, so the core is walked backwards and both sequences
    /// advance together in one pass.
    pub fn mark_path_condition(
        &mut self,
        solver: &mut dyn SubsumptionSolver,
        branch_condition: Option<&Rc<IrValue>>,
    ) {
        if !self.interpolation {
            return;
        }
        let unsat_core = solver.get_unsat_core();
        trace!("marking path condition from core {:?}", unsat_core);
        let node = self.node(self.current);
        let dependency = node.dependency.clone();
        let mut graph = AllocationGraph::new();
        if let Some(condition) = branch_condition {
            if let Some(value) = dependency.get_latest_value(condition) {
                dependency.mark_all_values(&mut graph, &value);
            }
        }
        let frames: Vec<Rc<PathConditionFrame>> = node.path_condition.iter().cloned().collect();
        let mut frame_iter = frames.iter();
        'clauses: for clause in unsat_core.iter().rev() {
            loop {
                match frame_iter.next() {
                    Some(frame) => {
                        if frame.matches(clause) {
                            frame.include_in_interpolant(&mut graph, &dependency);
                            continue 'clauses;
                        }
                    }
                    None => break 'clauses,
                }
            }
        }
        dependency.compute_core_allocations(&mut graph);
    }

    /// Binds callee formals at a call site.
    pub fn bind_call_arguments(&mut self, site: &Rc<Instruction>, arguments: &[ExprRef]) {
        if !self.interpolation {
            return;
        }
        self.node(self.current)
            .dependency
            .bind_call_arguments(site, arguments);
    }

    /// Binds a call site's result to the callee's returned value.
    pub fn bind_return_value(
        &mut self,
        site: &Rc<Instruction>,
        ret: &Rc<Instruction>,
        value: ExprRef,
    ) {
        if !self.interpolation {
            return;
        }
        self.node(self.current)
            .dependency
            .bind_return_value(site, ret, value);
    }

    pub fn stats(&self) -> &SubsumptionStats {
        &self.stats
    }

    pub fn table_entries(&self, program_point: u64) -> &[SubsumptionTableEntry] {
        self.table.entries_for(program_point)
    }

    pub fn table_len(&self) -> usize {
        self.table.len()
    }

    /// The recorded search tree in DOT form, when the export option is on.
    pub fn search_tree_dot(&self) -> Option<String> {
        self.search_tree.as_ref().map(|tree| tree.to_dot())
    }
}
