//! # Dependency Graphs
//!
//! Derives the execution DAG of a net from the blob names its operators
//! read and write. Node `i` is operator `i`; an edge `a → b` means `b` may
//! only start after `a` finished.
//!
//! ## Rules
//!
//! Walking the operators in list order, for every blob:
//!
//! - **read after write**: the blob's last writer is a parent of the reader
//! - **write after write**: the previous writer is a parent of the new writer
//! - **write after read**: readers since the last write are parents of the
//!   new writer, so in-place updates cannot race their readers
//!
//! Edges only ever point from an earlier operator to a later one, so the
//! graph is acyclic and list order is always a valid schedule.
//!
//! ```text
//!   0: Relu  in   → a        0 ──┐
//!   1: Relu  in   → b            ├──▶ 2
//!   2: Add   a, b → out      1 ──┘
//! ```

use std::collections::{HashMap, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::def::OperatorDef;

/// Operator dependency DAG, indexed by operator position.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<usize, ()>,
}

impl DependencyGraph {
    /// Build the graph for operators given in net order.
    pub fn build<'a>(ops: impl IntoIterator<Item = &'a OperatorDef>) -> Self {
        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let mut last_writer: HashMap<&str, NodeIndex> = HashMap::new();
        let mut readers: HashMap<&str, Vec<NodeIndex>> = HashMap::new();

        for (index, op) in ops.into_iter().enumerate() {
            let node = graph.add_node(index);

            for blob in &op.inputs {
                if let Some(&writer) = last_writer.get(blob.as_str()) {
                    graph.update_edge(writer, node, ());
                }
                readers.entry(blob.as_str()).or_default().push(node);
            }

            for blob in &op.outputs {
                if let Some(&writer) = last_writer.get(blob.as_str()) {
                    if writer != node {
                        graph.update_edge(writer, node, ());
                    }
                }
                for &reader in readers.get(blob.as_str()).into_iter().flatten() {
                    if reader != node {
                        graph.update_edge(reader, node, ());
                    }
                }
                readers.remove(blob.as_str());
                last_writer.insert(blob.as_str(), node);
            }
        }

        Self { graph }
    }

    /// Number of operators.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of dependency edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Operators waiting on `op`, ascending.
    pub fn children(&self, op: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .graph
            .neighbors_directed(NodeIndex::new(op), Direction::Outgoing)
            .map(|n| self.graph[n])
            .collect();
        out.sort_unstable();
        out
    }

    /// Parent count of every operator, by position.
    pub fn in_degrees(&self) -> Vec<usize> {
        self.graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
            .collect()
    }

    /// Kahn's algorithm, always releasing the lowest ready position first.
    ///
    /// Deterministic for a given graph.
    pub fn topological_order(&self) -> Vec<usize> {
        let mut in_degree = self.in_degrees();
        let mut ready: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| i)
            .collect();
        let mut order = Vec::with_capacity(self.len());

        while let Some(op) = ready.pop_front() {
            order.push(op);
            for child in self.children(op) {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    let at = ready.partition_point(|&r| r < child);
                    ready.insert(at, child);
                }
            }
        }

        order
    }
}
