//! Behavior Selection Engine
//!
//! A [`Session`] holds what the user controls: the selection, the active
//! mode and the navigation cursors. [`BehaviorEngine::rebuild`] reads the
//! structure and trace models and regenerates the whole [`BehaviorView`] for
//! the session on every call; nothing is diffed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::component::{package_of, Hierarchy};
use crate::domain::exploration::{ExplorationGraph, ExploreId};
use crate::domain::palette::{Palette, Rgb};
use crate::domain::trace::{TraceModel, TraceNodeId};

pub const NO_SELECTION: &str = "No components selected";
pub const NO_PATH_FOUND: &str = "No paths found for selection";
pub const MULTIPLE_SELECTED: &str = "More than one component selected";
pub const NO_TRACE_FOUND: &str = "No traces found for selection";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorMode {
    #[default]
    Aggregation,
    Path,
    Trace,
}

impl BehaviorMode {
    pub fn from_str(s: &str) -> Option<BehaviorMode> {
        match s.to_lowercase().as_str() {
            "aggregation" | "aggregate" => Some(BehaviorMode::Aggregation),
            "path" | "paths" => Some(BehaviorMode::Path),
            "trace" | "traces" => Some(BehaviorMode::Trace),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceMode {
    #[default]
    Depth,
    Explore,
}

impl TraceMode {
    pub fn from_str(s: &str) -> Option<TraceMode> {
        match s.to_lowercase().as_str() {
            "depth" => Some(TraceMode::Depth),
            "explore" | "exploration" => Some(TraceMode::Explore),
            _ => None,
        }
    }
}

/// Cursor movement direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Forward,
    Backward,
}

/// User-controlled state that survives rebuilds.
#[derive(Debug, Clone)]
pub struct Session {
    selection: Vec<String>,
    pub mode: BehaviorMode,
    pub trace_mode: TraceMode,
    pub clustering: bool,
    active_path: usize,
    active_trace: Option<TraceNodeId>,
    trace_depth: usize,
    initial_depth: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Session {
    pub fn new(initial_depth: usize) -> Self {
        Self {
            selection: Vec::new(),
            mode: BehaviorMode::default(),
            trace_mode: TraceMode::default(),
            clustering: true,
            active_path: 0,
            active_trace: None,
            trace_depth: initial_depth,
            initial_depth,
        }
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.iter().any(|s| s == id)
    }

    /// Add to the selection; returns false if it was already selected.
    pub fn select(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.is_selected(&id) {
            return false;
        }
        self.selection.push(id);
        true
    }

    pub fn deselect(&mut self, id: &str) -> bool {
        let before = self.selection.len();
        self.selection.retain(|s| s != id);
        self.selection.len() != before
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Back to a fresh session: empty selection, cursors and depth reset.
    /// Mode choices are kept.
    pub fn reset(&mut self) {
        self.selection.clear();
        self.active_path = 0;
        self.active_trace = None;
        self.trace_depth = self.initial_depth;
    }

    pub fn active_path(&self) -> usize {
        self.active_path
    }

    pub fn set_active_path(&mut self, index: usize) {
        self.active_path = index;
    }

    pub fn active_trace(&self) -> Option<TraceNodeId> {
        self.active_trace
    }

    pub fn trace_depth(&self) -> usize {
        self.trace_depth
    }

    pub fn set_trace_depth(&mut self, depth: usize) {
        self.trace_depth = depth;
    }

    pub fn deepen(&mut self) {
        self.trace_depth += 1;
    }

    /// Decrease the depth, never below zero.
    pub fn shallow(&mut self) {
        self.trace_depth = self.trace_depth.saturating_sub(1);
    }
}

/// Text for one of the two status slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub text: String,
    pub is_error: bool,
}

impl Status {
    pub fn info(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: false }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewNode {
    /// Identity of the node in the view; the component id, or
    /// `component@depth` for exploration nodes below the origin.
    pub key: String,
    pub component: String,
    pub label: String,
    pub depth: usize,
    pub selected: bool,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewEdge {
    pub source: String,
    pub target: String,
    pub weight: u64,
    pub bidirectional: bool,
    pub color_start: Rgb,
    pub color_end: Rgb,
    pub depth: usize,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub package: String,
    pub members: Vec<String>,
}

/// Everything a renderer needs for one frame of the behavior graph.
#[derive(Debug, Clone)]
pub struct BehaviorView {
    pub mode: BehaviorMode,
    pub nodes: Vec<ViewNode>,
    pub edges: Vec<ViewEdge>,
    pub path_status: Status,
    pub trace_status: Status,
    pub clusters: Vec<Cluster>,
    pub exploration: Option<ExplorationGraph>,
}

impl BehaviorView {
    pub fn node(&self, key: &str) -> Option<&ViewNode> {
        self.nodes.iter().find(|node| node.key == key)
    }

    pub fn visible_nodes(&self) -> impl Iterator<Item = &ViewNode> {
        self.nodes.iter().filter(|node| node.visible)
    }

    pub fn visible_edges(&self) -> impl Iterator<Item = &ViewEdge> {
        self.edges.iter().filter(|edge| edge.visible)
    }

    /// Open or close an exploration node. Returns false when the view has no
    /// exploration graph or no node with that key.
    pub fn toggle(&mut self, key: &str) -> bool {
        let Some(graph) = self.exploration.as_mut() else {
            return false;
        };
        let Some(id) = graph.find_key(key) else {
            return false;
        };
        graph.toggle(id);
        self.sync_visibility();
        true
    }

    fn sync_visibility(&mut self) {
        let Some(graph) = &self.exploration else { return };
        for (node, (_, explore)) in self.nodes.iter_mut().zip(graph.nodes()) {
            node.visible = explore.visible;
        }
        for (edge, explore) in self.edges.iter_mut().zip(graph.edges()) {
            edge.visible = explore.visible;
        }
    }
}

/// Accumulates nodes and edges for one rebuild.
struct ViewBuilder<'a> {
    hierarchy: &'a Hierarchy,
    session: &'a Session,
    nodes: Vec<ViewNode>,
    edges: Vec<ViewEdge>,
}

impl<'a> ViewBuilder<'a> {
    fn new(hierarchy: &'a Hierarchy, session: &'a Session) -> Self {
        Self {
            hierarchy,
            session,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.nodes.iter().any(|node| node.key == key)
    }

    fn spawn(&mut self, component: &str) {
        if !self.contains(component) {
            self.nodes.push(self.make_node(component.to_string(), component, 0));
        }
    }

    fn make_node(&self, key: String, component: &str, depth: usize) -> ViewNode {
        ViewNode {
            key,
            component: component.to_string(),
            label: self.hierarchy.display_label(component).to_string(),
            depth,
            selected: self.session.is_selected(component),
            visible: true,
        }
    }

    fn edge(&mut self, source: &str, target: &str, weight: u64, bidirectional: bool, depth: usize, colors: (Rgb, Rgb)) {
        self.edges.push(ViewEdge {
            source: source.to_string(),
            target: target.to_string(),
            weight,
            bidirectional,
            color_start: colors.0,
            color_end: colors.1,
            depth,
            visible: true,
        });
    }
}

pub struct BehaviorEngine<'a> {
    hierarchy: &'a Hierarchy,
    traces: &'a TraceModel,
    palette: Palette,
}

impl<'a> BehaviorEngine<'a> {
    pub fn new(hierarchy: &'a Hierarchy, traces: &'a TraceModel) -> Self {
        Self {
            hierarchy,
            traces,
            palette: Palette::default(),
        }
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Regenerate the view for the current session state.
    pub fn rebuild(&self, session: &mut Session) -> BehaviorView {
        let mut exploration = None;
        let mut path_status = self.path_status(session);

        let (nodes, edges) = match session.mode {
            BehaviorMode::Aggregation => self.aggregated_calls(session),
            BehaviorMode::Path => {
                let (nodes, edges, status) = self.path(session);
                path_status = status;
                (nodes, edges)
            }
            BehaviorMode::Trace => match session.trace_mode {
                TraceMode::Depth => self.trace_depth(session),
                TraceMode::Explore => {
                    let (nodes, edges, graph) = self.trace_exploration(session);
                    exploration = graph;
                    (nodes, edges)
                }
            },
        };

        let clusters = if session.clustering && session.mode != BehaviorMode::Aggregation {
            Self::clusters(&nodes)
        } else {
            Vec::new()
        };

        let view = BehaviorView {
            mode: session.mode,
            nodes,
            edges,
            path_status,
            trace_status: self.trace_status(session),
            clusters,
            exploration,
        };
        debug!(
            mode = ?view.mode,
            nodes = view.nodes.len(),
            edges = view.edges.len(),
            "behavior view rebuilt"
        );
        view
    }

    fn selection_nodes<'s>(&'s self, session: &'s Session) -> ViewBuilder<'s> {
        let mut builder = ViewBuilder::new(self.hierarchy, session);
        for id in session.selection() {
            builder.spawn(id);
        }
        builder
    }

    fn aggregated_calls(&self, session: &Session) -> (Vec<ViewNode>, Vec<ViewEdge>) {
        let mut view = self.selection_nodes(session);
        let colors = (self.palette.call_start, self.palette.call_end);

        for (source, targets) in self.traces.calls() {
            if !session.is_selected(source) {
                continue;
            }
            for (target, &count) in targets {
                if !session.is_selected(target) {
                    continue;
                }
                let bidirectional = self.traces.call_count(target, source).is_some();
                view.edge(source, target, count, bidirectional, 0, colors);
            }
        }

        (view.nodes, view.edges)
    }

    /// Find a path at or after the cursor that covers the selection,
    /// wrapping around once.
    fn seek_path(&self, session: &mut Session, step: Option<Step>) -> bool {
        let paths = self.traces.paths();
        if paths.is_empty() {
            return false;
        }
        if session.active_path >= paths.len() {
            session.active_path = 0;
        }

        let start = session.active_path;
        let advance = |index: usize| match step {
            Some(Step::Backward) => (index + paths.len() - 1) % paths.len(),
            _ => (index + 1) % paths.len(),
        };

        if step.is_some() {
            session.active_path = advance(session.active_path);
        }
        while !paths[session.active_path].covers(session.selection()) {
            session.active_path = advance(session.active_path);
            if session.active_path == start {
                return paths[start].covers(session.selection());
            }
        }
        true
    }

    /// Move the path cursor to the next (or previous) path that covers the
    /// selection. Without any such path the cursor ends where it started.
    pub fn step_path(&self, session: &mut Session, step: Step) {
        self.seek_path(session, Some(step));
    }

    fn path(&self, session: &mut Session) -> (Vec<ViewNode>, Vec<ViewEdge>, Status) {
        if session.selection().is_empty() {
            return (Vec::new(), Vec::new(), Status::error(NO_SELECTION));
        }
        if !self.seek_path(session, None) {
            let view = self.selection_nodes(session);
            return (view.nodes, view.edges, Status::error(NO_PATH_FOUND));
        }

        let session = &*session;
        let path = &self.traces.paths()[session.active_path];
        let mut view = self.selection_nodes(session);
        let step = 1.0 / (path.len() - 1) as f32;

        for (i, pair) in path.sequence.windows(2).enumerate() {
            view.spawn(&pair[0]);
            view.spawn(&pair[1]);
            view.edge(&pair[0], &pair[1], 1, false, i, self.palette.segment(step, i));
        }

        let status = self.path_status(session);
        (view.nodes, view.edges, status)
    }

    fn path_status(&self, session: &Session) -> Status {
        if session.selection().is_empty() {
            return Status::error(NO_SELECTION);
        }
        let total = self.traces.paths().len();
        if total == 0 {
            return Status::error(NO_PATH_FOUND);
        }
        // An out-of-range cursor restarts at the first path on the next search.
        let position = if session.active_path < total { session.active_path + 1 } else { 1 };
        Status::info(format!("Path: {}/{}", position, total))
    }

    /// Resolve the trace occurrence to show, or `None` when the selection
    /// does not allow one. Clears the cursor in that case.
    fn resolve_trace(&self, session: &mut Session) -> Option<TraceNodeId> {
        let occurrences = match session.selection() {
            [single] => self.traces.occurrences(single),
            _ => &[],
        };
        if occurrences.is_empty() {
            session.active_trace = None;
            return None;
        }

        let active = match session.active_trace {
            Some(current) if occurrences.contains(&current) => current,
            _ => occurrences[0],
        };
        session.active_trace = Some(active);
        Some(active)
    }

    /// Move the active occurrence within the selected class's occurrences.
    /// Stops at both ends and does nothing without an active occurrence.
    pub fn step_trace(&self, session: &mut Session, step: Step) {
        let Some(current) = session.active_trace else { return };
        let [selected] = session.selection() else { return };
        let occurrences = self.traces.occurrences(selected);
        let Some(index) = occurrences.iter().position(|id| *id == current) else {
            return;
        };

        let next = match step {
            Step::Forward if index + 1 < occurrences.len() => index + 1,
            Step::Backward if index > 0 => index - 1,
            _ => index,
        };
        session.active_trace = Some(occurrences[next]);
    }

    /// A missing or stale cursor reports the first occurrence, the one
    /// `resolve_trace` falls back to.
    fn trace_status(&self, session: &Session) -> Status {
        let selected = match session.selection() {
            [] => return Status::error(NO_SELECTION),
            [single] => single,
            _ => return Status::error(MULTIPLE_SELECTED),
        };
        let occurrences = self.traces.occurrences(selected);
        if occurrences.is_empty() {
            return Status::error(NO_TRACE_FOUND);
        }

        let position = session
            .active_trace
            .and_then(|active| occurrences.iter().position(|id| *id == active))
            .map(|index| index + 1)
            .unwrap_or(1);
        let mut text = format!("Trace: {}/{}", position, occurrences.len());
        if session.trace_mode == TraceMode::Depth {
            text.push_str(&format!("\nDepth: {}", session.trace_depth));
        }
        Status::info(text)
    }

    fn trace_depth(&self, session: &mut Session) -> (Vec<ViewNode>, Vec<ViewEdge>) {
        let active = self.resolve_trace(session);
        let session = &*session;
        let mut view = self.selection_nodes(session);

        let depth = session.trace_depth;
        if let Some(origin) = active.filter(|_| depth > 0) {
            let step = 1.0 / depth as f32;
            self.expand_depth(&mut view, origin, depth, 0, step);
        }

        (view.nodes, view.edges)
    }

    fn expand_depth(&self, view: &mut ViewBuilder<'_>, id: TraceNodeId, remaining: usize, depth: usize, step: f32) {
        if remaining == 0 {
            return;
        }
        let node = self.traces.node(id);
        for &child_id in &node.children {
            let child = self.traces.node(child_id);
            view.spawn(&child.label);
            view.edge(&node.label, &child.label, child.count, false, depth, self.palette.segment(step, depth));
            self.expand_depth(view, child_id, remaining - 1, depth + 1, step);
        }
    }

    fn trace_exploration(
        &self,
        session: &mut Session,
    ) -> (Vec<ViewNode>, Vec<ViewEdge>, Option<ExplorationGraph>) {
        let active = self.resolve_trace(session);
        let session = &*session;

        let Some(origin) = active else {
            let view = self.selection_nodes(session);
            return (view.nodes, view.edges, None);
        };

        let mut graph = ExplorationGraph::new();
        let root = graph.spawn(&self.traces.node(origin).label, 0);
        let step = 1.0 / self.traces.subtree_depth(origin).max(1) as f32;
        self.expand_exploration(&mut graph, origin, root, 0, step);
        graph.close(root);

        let builder = ViewBuilder::new(self.hierarchy, session);
        let nodes = graph
            .nodes()
            .map(|(_, node)| {
                let mut view_node = builder.make_node(node.key(), &node.component, node.depth);
                view_node.visible = node.visible;
                view_node
            })
            .collect();
        let edges = graph
            .edges()
            .iter()
            .map(|edge| ViewEdge {
                source: graph.node(edge.source).key(),
                target: graph.node(edge.target).key(),
                weight: edge.weight,
                bidirectional: false,
                color_start: edge.color_start,
                color_end: edge.color_end,
                depth: edge.depth,
                visible: edge.visible,
            })
            .collect();

        (nodes, edges, Some(graph))
    }

    fn expand_exploration(
        &self,
        graph: &mut ExplorationGraph,
        id: TraceNodeId,
        parent: ExploreId,
        depth: usize,
        step: f32,
    ) {
        for &child_id in &self.traces.node(id).children {
            let child = self.traces.node(child_id);
            let target = graph.spawn(&child.label, depth + 1);
            graph.connect(parent, target, child.count, self.palette.segment(step, depth));
            self.expand_exploration(graph, child_id, target, depth + 1, step);
        }
    }

    fn clusters(nodes: &[ViewNode]) -> Vec<Cluster> {
        let mut grouped: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for node in nodes {
            grouped
                .entry(package_of(&node.component))
                .or_default()
                .push(node.key.clone());
        }
        grouped
            .into_iter()
            .map(|(package, members)| Cluster {
                package: package.to_string(),
                members,
            })
            .collect()
    }
}
