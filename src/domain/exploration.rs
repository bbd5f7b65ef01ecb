//! Exploration graph for interactive trace browsing.
//!
//! Every `(class, depth)` pair is its own node, so a class reached at two
//! call depths shows up twice. Nodes can be opened and closed; closing a node
//! hides its outgoing edges and hides a child only once all of that child's
//! parents are closed.

use std::collections::HashMap;

use crate::domain::palette::Rgb;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExploreId(usize);

impl ExploreId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenState {
    Open,
    Closed,
}

#[derive(Debug, Clone)]
pub struct ExploreNode {
    pub component: String,
    pub depth: usize,
    pub state: OpenState,
    pub visible: bool,
    pub children: Vec<ExploreId>,
    pub parents: Vec<ExploreId>,
    /// Indexes into [`ExplorationGraph::edges`] of the edges leaving this node.
    pub edges: Vec<usize>,
}

impl ExploreNode {
    pub fn is_open(&self) -> bool {
        self.state == OpenState::Open
    }

    /// Stable key, unique per `(component, depth)`.
    pub fn key(&self) -> String {
        explore_key(&self.component, self.depth)
    }
}

#[derive(Debug, Clone)]
pub struct ExploreEdge {
    pub source: ExploreId,
    pub target: ExploreId,
    pub weight: u64,
    pub depth: usize,
    pub color_start: Rgb,
    pub color_end: Rgb,
    pub visible: bool,
}

pub fn explore_key(component: &str, depth: usize) -> String {
    if depth == 0 {
        component.to_string()
    } else {
        format!("{}@{}", component, depth)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExplorationGraph {
    nodes: Vec<ExploreNode>,
    edges: Vec<ExploreEdge>,
    index: HashMap<(String, usize), ExploreId>,
}

impl ExplorationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the node for `(component, depth)`, spawning it open and visible.
    pub fn spawn(&mut self, component: &str, depth: usize) -> ExploreId {
        if let Some(&id) = self.index.get(&(component.to_string(), depth)) {
            return id;
        }
        let id = ExploreId(self.nodes.len());
        self.nodes.push(ExploreNode {
            component: component.to_string(),
            depth,
            state: OpenState::Open,
            visible: true,
            children: Vec::new(),
            parents: Vec::new(),
            edges: Vec::new(),
        });
        self.index.insert((component.to_string(), depth), id);
        id
    }

    /// Link `parent -> child` and attach an edge owned by `parent`.
    pub fn connect(&mut self, parent: ExploreId, child: ExploreId, weight: u64, colors: (Rgb, Rgb)) {
        if !self.nodes[parent.0].children.contains(&child) {
            self.nodes[parent.0].children.push(child);
        }
        if !self.nodes[child.0].parents.contains(&parent) {
            self.nodes[child.0].parents.push(parent);
        }

        let depth = self.nodes[parent.0].depth;
        let edge = self.edges.len();
        self.edges.push(ExploreEdge {
            source: parent,
            target: child,
            weight,
            depth,
            color_start: colors.0,
            color_end: colors.1,
            visible: true,
        });
        self.nodes[parent.0].edges.push(edge);
    }

    pub fn lookup(&self, component: &str, depth: usize) -> Option<ExploreId> {
        self.index.get(&(component.to_string(), depth)).copied()
    }

    pub fn find_key(&self, key: &str) -> Option<ExploreId> {
        self.nodes
            .iter()
            .position(|node| node.key() == key)
            .map(ExploreId)
    }

    pub fn node(&self, id: ExploreId) -> &ExploreNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (ExploreId, &ExploreNode)> {
        self.nodes.iter().enumerate().map(|(i, node)| (ExploreId(i), node))
    }

    pub fn edges(&self) -> &[ExploreEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Show this node's edges and direct children.
    pub fn open(&mut self, id: ExploreId) {
        for edge in self.nodes[id.0].edges.clone() {
            self.edges[edge].visible = true;
        }
        for child in self.nodes[id.0].children.clone() {
            self.nodes[child.0].visible = true;
        }
        self.nodes[id.0].state = OpenState::Open;
    }

    /// Hide this node's edges, then close and hide every child whose parents
    /// are all closed.
    pub fn close(&mut self, id: ExploreId) {
        self.nodes[id.0].state = OpenState::Closed;

        for edge in self.nodes[id.0].edges.clone() {
            self.edges[edge].visible = false;
        }

        for child in self.nodes[id.0].children.clone() {
            let orphaned = self.nodes[child.0]
                .parents
                .iter()
                .all(|parent| !self.nodes[parent.0].is_open());
            if orphaned {
                if self.nodes[child.0].is_open() {
                    self.close(child);
                }
                self.nodes[child.0].visible = false;
            }
        }
    }

    /// Flip the open state of a node.
    pub fn toggle(&mut self, id: ExploreId) {
        if self.nodes[id.0].is_open() {
            self.close(id);
        } else {
            self.open(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colors() -> (Rgb, Rgb) {
        (Rgb::GREEN, Rgb::RED)
    }

    #[test]
    fn test_same_class_at_two_depths_is_two_nodes() {
        let mut graph = ExplorationGraph::new();
        let a0 = graph.spawn("A", 0);
        let b1 = graph.spawn("B", 1);
        let a2 = graph.spawn("A", 2);
        graph.connect(a0, b1, 1, colors());
        graph.connect(b1, a2, 1, colors());

        assert_ne!(a0, a2);
        assert_eq!(graph.spawn("B", 1), b1);
        assert_eq!(graph.node(a2).key(), "A@2");
        assert_eq!(graph.find_key("A@2"), Some(a2));
    }

    #[test]
    fn test_close_cascades_and_open_reveals_one_level() {
        let mut graph = ExplorationGraph::new();
        let a = graph.spawn("A", 0);
        let b = graph.spawn("B", 1);
        let c = graph.spawn("C", 2);
        graph.connect(a, b, 1, colors());
        graph.connect(b, c, 1, colors());

        graph.close(a);
        assert!(!graph.node(b).visible);
        assert!(!graph.node(c).visible);
        assert!(!graph.node(b).is_open());
        assert!(graph.edges().iter().all(|edge| !edge.visible));

        graph.open(a);
        assert!(graph.node(b).visible);
        assert!(!graph.node(c).visible);
        assert!(graph.edges()[0].visible);
        assert!(!graph.edges()[1].visible);
    }
}
