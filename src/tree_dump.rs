// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use petgraph::dot::Dot;
use petgraph::graph::NodeIndex;
use petgraph::Graph;
use std::collections::HashMap;

/// A recording of the explored search tree, kept only when the export option
/// is on: nodes as they are visited, parent edges from splits, and
/// subsumption edges from pruned nodes to the program point that subsumed
/// them.
pub struct SearchTree {
    graph: Graph<String, &'static str>,
    node_indices: HashMap<usize, NodeIndex>,
    point_indices: HashMap<u64, NodeIndex>,
}

impl SearchTree {
    pub fn new() -> SearchTree {
        SearchTree {
            graph: Graph::new(),
            node_indices: HashMap::new(),
            point_indices: HashMap::new(),
        }
    }

    fn index_for(&mut self, node: usize) -> NodeIndex {
        if let Some(index) = self.node_indices.get(&node) {
            return *index;
        }
        let index = self.graph.add_node(format!("n{}", node));
        self.node_indices.insert(node, index);
        index
    }

    pub fn record_split(&mut self, parent: usize, left: usize, right: usize) {
        let parent_index = self.index_for(parent);
        let left_index = self.index_for(left);
        let right_index = self.index_for(right);
        self.graph.add_edge(parent_index, left_index, "L");
        self.graph.add_edge(parent_index, right_index, "R");
    }

    pub fn record_program_point(&mut self, node: usize, program_point: u64) {
        let index = self.index_for(node);
        self.graph[index] = format!("n{} @{}", node, program_point);
        self.point_indices.entry(program_point).or_insert(index);
    }

    /// Draws a dashed-intent edge from a pruned node to the program point
    /// whose table entry subsumed it.
    pub fn record_subsumption(&mut self, node: usize, program_point: u64) {
        let index = self.index_for(node);
        self.graph[index].push_str(" (subsumed)");
        if let Some(target) = self.point_indices.get(&program_point).copied() {
            if target != index {
                self.graph.add_edge(index, target, "subsumed-by");
            }
        }
    }

    pub fn to_dot(&self) -> String {
        format!("{}", Dot::with_config(&self.graph, &[]))
    }
}

impl Default for SearchTree {
    fn default() -> SearchTree {
        SearchTree::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_subsumptions_show_up_in_the_dump() {
        let mut tree = SearchTree::new();
        tree.record_program_point(0, 100);
        tree.record_split(0, 1, 2);
        tree.record_program_point(1, 100);
        tree.record_subsumption(1, 100);
        let dot = tree.to_dot();
        assert!(dot.contains("subsumed-by"));
        assert!(dot.contains("@100"));
    }
}
