// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::dependency::Allocation;

use petgraph::graph::NodeIndex;
use petgraph::{Direction, Graph};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result};
use std::rc::Rc;

/// A transient DAG over allocations, built from the unsat core and drained
/// into core flags. An edge runs from a parent allocation to the allocation
/// whose content was derived from it; the sink set tracks the nodes that are
/// nobody's parent.
pub struct AllocationGraph {
    graph: Graph<Rc<Allocation>, ()>,
    indices: HashMap<u64, NodeIndex>,
    sinks: Vec<NodeIndex>,
}

impl AllocationGraph {
    pub fn new() -> AllocationGraph {
        AllocationGraph {
            graph: Graph::new(),
            indices: HashMap::new(),
            sinks: Vec::new(),
        }
    }

    fn node_for(&mut self, allocation: &Rc<Allocation>) -> (NodeIndex, bool) {
        if let Some(index) = self.indices.get(&allocation.id()) {
            return (*index, false);
        }
        let index = self.graph.add_node(allocation.clone());
        self.indices.insert(allocation.id(), index);
        (index, true)
    }

    /// Inserts the edge source → target, creating nodes as needed. Returns
    /// true only when a node was actually introduced; the caller uses this to
    /// prune redundant re-traversals of diamond-shaped flow.
    pub fn add_new_edge(&mut self, source: &Rc<Allocation>, target: &Rc<Allocation>) -> bool {
        let (source_index, source_created) = self.node_for(source);
        let (target_index, target_created) = self.node_for(target);
        if !self.graph.contains_edge(source_index, target_index) {
            self.graph.add_edge(source_index, target_index, ());
        }
        // The source now has a child, so it cannot be a sink; the target is a
        // sink exactly when nothing was derived from it.
        self.sinks.retain(|index| *index != source_index);
        if self
            .graph
            .neighbors_directed(target_index, Direction::Outgoing)
            .next()
            .is_none()
            && !self.sinks.contains(&target_index)
        {
            self.sinks.push(target_index);
        }
        source_created || target_created
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// The allocations currently in the sink set.
    pub fn sink_allocations(&self) -> Vec<Rc<Allocation>> {
        self.sinks
            .iter()
            .map(|index| self.graph[*index].clone())
            .collect()
    }

    /// Replaces the given sink by its parents in the sink set.
    pub fn consume_sink_node(&mut self, allocation: &Rc<Allocation>) {
        let position = self
            .sinks
            .iter()
            .position(|index| self.graph[*index].id() == allocation.id());
        let position = match position {
            Some(position) => position,
            None => return,
        };
        let index = self.sinks.remove(position);
        let parents: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(index, Direction::Incoming)
            .collect();
        for parent in parents {
            if !self.sinks.contains(&parent) {
                self.sinks.push(parent);
            }
        }
    }

    /// True when every sink has no outgoing edge and every non-sink has one.
    /// Holds for any graph built purely through `add_new_edge`.
    pub fn sinks_are_consistent(&self) -> bool {
        self.graph.node_indices().all(|index| {
            let childless = self
                .graph
                .neighbors_directed(index, Direction::Outgoing)
                .next()
                .is_none();
            childless == self.sinks.contains(&index)
        })
    }
}

impl Default for AllocationGraph {
    fn default() -> AllocationGraph {
        AllocationGraph::new()
    }
}

impl Debug for AllocationGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "AllocationGraph")?;
        for index in self.graph.node_indices() {
            let parents: Vec<&Rc<Allocation>> = self
                .graph
                .neighbors_directed(index, Direction::Incoming)
                .map(|parent| &self.graph[parent])
                .collect();
            writeln!(
                f,
                "  {:?}{} depends on {:?}",
                self.graph[index],
                if self.sinks.contains(&index) {
                    " (sink)"
                } else {
                    ""
                },
                parents
            )?;
        }
        Ok(())
    }
}
