//! Class graph: inheritance, interface and `dependson` edges.
//!
//! Edges point from the dependent class to the class it needs, so a
//! topological order of the reversed graph is a valid parse order.
//!
//! # Structure
//!
//! ```text
//! Pawn ──Extends──> Actor ──Extends──> Object
//!   │
//!   └──DependsOn──> Weapon
//! ```

use petgraph::Direction;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashMap;

use unrealscript_core::StructId;

/// Why one class needs another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassEdge {
    Extends,
    Implements,
    DependsOn,
}

/// Directed graph over every registered class.
#[derive(Debug, Default)]
pub struct ClassGraph {
    graph: DiGraph<StructId, ClassEdge>,
    nodes: FxHashMap<StructId, NodeIndex>,
}

impl ClassGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class node if it isn't present yet.
    pub fn add_class(&mut self, class: StructId) -> NodeIndex {
        if let Some(&node) = self.nodes.get(&class) {
            return node;
        }
        let node = self.graph.add_node(class);
        self.nodes.insert(class, node);
        node
    }

    pub fn contains(&self, class: StructId) -> bool {
        self.nodes.contains_key(&class)
    }

    /// Record `child extends parent`, replacing any previous parent.
    pub fn set_parent(&mut self, child: StructId, parent: StructId) {
        let child_node = self.add_class(child);
        let parent_node = self.add_class(parent);
        let mut old: Vec<_> = self
            .graph
            .edges_directed(child_node, Direction::Outgoing)
            .filter(|edge| *edge.weight() == ClassEdge::Extends)
            .map(|edge| edge.id())
            .collect();
        old.sort_unstable_by(|a, b| b.cmp(a));
        for edge in old {
            self.graph.remove_edge(edge);
        }
        self.graph.add_edge(child_node, parent_node, ClassEdge::Extends);
    }

    /// Record an `implements` or `dependson` edge.
    pub fn add_dependency(&mut self, from: StructId, to: StructId, kind: ClassEdge) {
        let from_node = self.add_class(from);
        let to_node = self.add_class(to);
        let exists = self
            .graph
            .edges_directed(from_node, Direction::Outgoing)
            .any(|edge| edge.target() == to_node && *edge.weight() == kind);
        if !exists {
            self.graph.add_edge(from_node, to_node, kind);
        }
    }

    /// Drop the `implements`/`dependson` edges a class declared.
    pub fn clear_declared(&mut self, class: StructId) {
        let Some(&node) = self.nodes.get(&class) else {
            return;
        };
        // Removal swaps the last edge into the hole, so go from the top down.
        let mut declared: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .filter(|edge| *edge.weight() != ClassEdge::Extends)
            .map(|edge| edge.id())
            .collect();
        declared.sort_unstable_by(|a, b| b.cmp(a));
        for edge in declared {
            self.graph.remove_edge(edge);
        }
    }

    /// Direct parent, if any.
    pub fn parent(&self, class: StructId) -> Option<StructId> {
        let node = *self.nodes.get(&class)?;
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .find(|edge| *edge.weight() == ClassEdge::Extends)
            .map(|edge| self.graph[edge.target()])
    }

    /// Direct subclasses, unordered.
    pub fn subclasses(&self, class: StructId) -> Vec<StructId> {
        let Some(&node) = self.nodes.get(&class) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(node, Direction::Incoming)
            .filter(|edge| *edge.weight() == ClassEdge::Extends)
            .map(|edge| self.graph[edge.source()])
            .collect()
    }

    /// Targets of a class's edges of one kind.
    pub fn dependencies(&self, class: StructId, kind: ClassEdge) -> Vec<StructId> {
        let Some(&node) = self.nodes.get(&class) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .filter(|edge| *edge.weight() == kind)
            .map(|edge| self.graph[edge.target()])
            .collect()
    }

    /// Classes that sit on a dependency cycle, grouped per cycle.
    ///
    /// Empty when the graph is acyclic.
    pub fn cycles(&self) -> Vec<Vec<StructId>> {
        if toposort(&self.graph, None).is_ok() {
            return Vec::new();
        }
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&node| self.graph.find_edge(node, node).is_some())
            })
            .map(|component| component.into_iter().map(|node| self.graph[node]).collect())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}
