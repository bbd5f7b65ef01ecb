//! Trace Model & Builder
//!
//! A recorded execution trace is a tree of `(class, count)` records. The
//! builder drops records outside the structural root's namespace (splicing
//! their children into the parent), then derives three indexes that stay
//! immutable for the rest of the session:
//!
//! - `paths`: deduplicated root-to-leaf class sequences with summed counts
//! - `calls`: pairwise call counts over every root-to-leaf path
//! - `traces`: every non-leaf occurrence of a class, in traversal order

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;

/// Default marker of compiler-generated classes (inner/anonymous classes).
pub const DEFAULT_SYNTHETIC_MARKER: &str = "$";

/// A raw trace record as parsed from the trace dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTraceNode {
    #[serde(rename = "class")]
    pub label: String,
    pub count: u64,
    #[serde(default)]
    pub children: Vec<RawTraceNode>,
}

impl RawTraceNode {
    pub fn new(label: impl Into<String>, count: u64, children: Vec<RawTraceNode>) -> Self {
        Self {
            label: label.into(),
            count,
            children,
        }
    }

    pub fn leaf(label: impl Into<String>, count: u64) -> Self {
        Self::new(label, count, Vec::new())
    }
}

/// The whole trace document: an unlabeled container of top-level records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTrace {
    #[serde(default)]
    pub calls: Vec<RawTraceNode>,
}

/// Handle of a node in the normalized trace tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceNodeId(usize);

impl TraceNodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub label: String,
    pub count: u64,
    pub parent: Option<TraceNodeId>,
    pub children: Vec<TraceNodeId>,
}

impl TraceEntry {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// One deduplicated call path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallPath {
    pub sequence: Vec<String>,
    pub count: u64,
}

impl CallPath {
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// True when every identifier of `selection` occurs somewhere on the path.
    pub fn covers<S: AsRef<str>>(&self, selection: &[S]) -> bool {
        selection
            .iter()
            .all(|id| self.sequence.iter().any(|step| step == id.as_ref()))
    }
}

pub type CallCounts = BTreeMap<String, BTreeMap<String, u64>>;

#[derive(Debug, Clone)]
pub struct TraceModel {
    nodes: Vec<TraceEntry>,
    roots: Vec<TraceNodeId>,
    paths: Vec<CallPath>,
    calls: CallCounts,
    traces: HashMap<String, Vec<TraceNodeId>>,
}

impl TraceModel {
    pub fn node(&self, id: TraceNodeId) -> &TraceEntry {
        &self.nodes[id.0]
    }

    pub fn roots(&self) -> &[TraceNodeId] {
        &self.roots
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn paths(&self) -> &[CallPath] {
        &self.paths
    }

    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    pub fn call_count(&self, source: &str, target: &str) -> Option<u64> {
        self.calls.get(source).and_then(|targets| targets.get(target)).copied()
    }

    /// Non-leaf occurrences of `label`; empty when the class never calls out.
    pub fn occurrences(&self, label: &str) -> &[TraceNodeId] {
        self.traces.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn traces(&self) -> &HashMap<String, Vec<TraceNodeId>> {
        &self.traces
    }

    /// Length of the longest downward chain below `id`.
    pub fn subtree_depth(&self, id: TraceNodeId) -> usize {
        self.node(id)
            .children
            .iter()
            .map(|child| 1 + self.subtree_depth(*child))
            .max()
            .unwrap_or(0)
    }

    /// One line per path: `A -> B -> C : count`.
    pub fn paths_report(&self) -> String {
        let mut report = String::new();
        for path in &self.paths {
            let _ = writeln!(report, "{} : {}", path.sequence.join(" -> "), path.count);
        }
        report
    }
}

pub struct TraceBuilder {
    root_namespace: String,
    synthetic_marker: String,
}

impl TraceBuilder {
    pub fn new(root_namespace: impl Into<String>) -> Self {
        Self {
            root_namespace: root_namespace.into(),
            synthetic_marker: DEFAULT_SYNTHETIC_MARKER.to_string(),
        }
    }

    pub fn with_synthetic_marker(mut self, marker: impl Into<String>) -> Self {
        self.synthetic_marker = marker.into();
        self
    }

    fn keeps(&self, node: &RawTraceNode) -> bool {
        node.label.starts_with(&self.root_namespace)
            && (self.synthetic_marker.is_empty() || !node.label.contains(&self.synthetic_marker))
    }

    pub fn build(&self, raw: RawTrace) -> Result<TraceModel> {
        let top_level = self.normalize(raw.calls);

        let mut model = TraceModel {
            nodes: Vec::new(),
            roots: Vec::new(),
            paths: Vec::new(),
            calls: BTreeMap::new(),
            traces: HashMap::new(),
        };
        for node in top_level {
            let id = Self::intern(&mut model.nodes, node, None);
            model.roots.push(id);
        }

        let mut raw_paths = Vec::new();
        let mut current = Vec::new();
        for &root in &model.roots {
            Self::generate_paths(&model.nodes, root, &mut current, &mut raw_paths);
        }

        let mut path_index: HashMap<Vec<String>, usize> = HashMap::new();
        for (sequence, count) in raw_paths {
            for pair in sequence.windows(2) {
                *model
                    .calls
                    .entry(pair[0].clone())
                    .or_default()
                    .entry(pair[1].clone())
                    .or_insert(0) += count;
            }

            match path_index.get(&sequence) {
                Some(&slot) => model.paths[slot].count += count,
                None => {
                    path_index.insert(sequence.clone(), model.paths.len());
                    model.paths.push(CallPath { sequence, count });
                }
            }
        }

        for &root in &model.roots {
            Self::generate_traces(&model.nodes, root, &mut model.traces);
        }

        info!(
            nodes = model.nodes.len(),
            paths = model.paths.len(),
            traced_classes = model.traces.len(),
            "trace model built"
        );
        Ok(model)
    }

    /// Splice out filtered records until every child passes, then recurse.
    fn normalize(&self, mut children: Vec<RawTraceNode>) -> Vec<RawTraceNode> {
        let mut rounds = 0;
        while !children.iter().all(|child| self.keeps(child)) {
            let mut kept = Vec::with_capacity(children.len());
            let mut promoted = Vec::new();
            for child in children {
                if self.keeps(&child) {
                    kept.push(child);
                } else {
                    promoted.extend(child.children);
                }
            }
            kept.extend(promoted);
            children = kept;
            rounds += 1;
        }
        if rounds > 0 {
            debug!(rounds, "spliced filtered trace records");
        }

        children
            .into_iter()
            .map(|mut child| {
                child.children = self.normalize(std::mem::take(&mut child.children));
                child
            })
            .collect()
    }

    fn intern(nodes: &mut Vec<TraceEntry>, raw: RawTraceNode, parent: Option<TraceNodeId>) -> TraceNodeId {
        let id = TraceNodeId(nodes.len());
        nodes.push(TraceEntry {
            label: raw.label,
            count: raw.count,
            parent,
            children: Vec::with_capacity(raw.children.len()),
        });
        for child in raw.children {
            let child_id = Self::intern(nodes, child, Some(id));
            nodes[id.0].children.push(child_id);
        }
        id
    }

    fn generate_paths(
        nodes: &[TraceEntry],
        id: TraceNodeId,
        current: &mut Vec<String>,
        out: &mut Vec<(Vec<String>, u64)>,
    ) {
        let node = &nodes[id.0];
        current.push(node.label.clone());
        if node.is_leaf() {
            if current.len() > 1 {
                out.push((current.clone(), node.count));
            }
        } else {
            for &child in &node.children {
                Self::generate_paths(nodes, child, current, out);
            }
        }
        current.pop();
    }

    fn generate_traces(nodes: &[TraceEntry], id: TraceNodeId, traces: &mut HashMap<String, Vec<TraceNodeId>>) {
        let node = &nodes[id.0];
        if !node.is_leaf() {
            traces.entry(node.label.clone()).or_default().push(id);
        }
        for &child in &node.children {
            Self::generate_traces(nodes, child, traces);
        }
    }
}
