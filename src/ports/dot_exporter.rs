//! Behavior Graph DOT Exporter
//!
//! Exports a BehaviorView as Graphviz DOT. Edge colors follow the call
//! gradient hints, package clusters become `subgraph cluster_*` blocks and
//! hidden exploration nodes are left out.

use std::io::Result;
use std::path::Path;

use crate::domain::behavior::{BehaviorView, ViewEdge, ViewNode};
use crate::ports::ViewExporter;

pub struct DotExporter;

impl ViewExporter for DotExporter {
    fn export(&self, view: &BehaviorView, path: &Path) -> Result<()> {
        std::fs::write(path, Self::to_dot(view))
    }
}

impl DotExporter {
    /// Convert a BehaviorView to a DOT string.
    pub fn to_dot(view: &BehaviorView) -> String {
        let mut lines = Vec::new();

        lines.push("digraph Behavior {".to_string());
        lines.push("    rankdir=LR;".to_string());
        lines.push("    nodesep=0.8;".to_string());
        lines.push("    node [fontname=\"Helvetica\", fontsize=12, shape=box, style=\"filled\"];".to_string());
        lines.push("    edge [fontname=\"Helvetica\", fontsize=10];".to_string());
        lines.push(format!(
            "    label=\"{}\\n{}\";",
            Self::escape_label(&view.path_status.text),
            Self::escape_label(&view.trace_status.text)
        ));
        lines.push("".to_string());

        let visible: Vec<&ViewNode> = view.visible_nodes().collect();
        let is_clustered = |key: &str| view.clusters.iter().any(|c| c.members.iter().any(|m| m == key));

        for (i, cluster) in view.clusters.iter().enumerate() {
            let members: Vec<&&ViewNode> = visible
                .iter()
                .filter(|node| cluster.members.contains(&node.key))
                .collect();
            if members.is_empty() {
                continue;
            }
            lines.push(format!("    subgraph cluster_{} {{", i));
            lines.push(format!("        label=\"{}\";", Self::escape_label(&cluster.package)));
            for node in members {
                lines.push(format!("        {}", Self::node_line(node)));
            }
            lines.push("    }".to_string());
        }

        for node in visible.iter().filter(|node| !is_clustered(&node.key)) {
            lines.push(format!("    {}", Self::node_line(node)));
        }

        lines.push("".to_string());

        for edge in view.visible_edges() {
            lines.push(format!("    {}", Self::edge_line(edge)));
        }

        lines.push("}".to_string());

        lines.join("\n")
    }

    fn node_line(node: &ViewNode) -> String {
        let (fill, pen) = if node.selected {
            ("#f9e2af", "3")
        } else {
            ("#89b4fa", "1")
        };
        format!(
            "\"{}\" [label=\"{}\", fillcolor=\"{}\", penwidth={}];",
            Self::escape_label(&node.key),
            Self::escape_label(&node.label),
            fill,
            pen
        )
    }

    fn edge_line(edge: &ViewEdge) -> String {
        let dir = if edge.bidirectional { ", dir=both" } else { "" };
        format!(
            "\"{}\" -> \"{}\" [label=\"{}\", color=\"{};0.5:{}\"{}];",
            Self::escape_label(&edge.source),
            Self::escape_label(&edge.target),
            edge.weight,
            edge.color_start.to_hex(),
            edge.color_end.to_hex(),
            dir
        )
    }

    fn escape_label(label: &str) -> String {
        label
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
    }
}
