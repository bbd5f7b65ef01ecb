use serde::{Deserialize, Serialize};

use crate::domain::behavior::{BehaviorMode, BehaviorView, Status};
use crate::domain::component::package_of;

#[derive(Debug, Serialize, Deserialize)]
pub struct ViewDto {
    pub mode: BehaviorMode,
    pub nodes: Vec<NodeDto>,
    pub edges: Vec<EdgeDto>,
    pub path_status: StatusDto,
    pub trace_status: StatusDto,
    pub clusters: Vec<ClusterDto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeDto {
    pub id: String,
    pub component: String,
    pub label: String,
    pub package: String,
    pub depth: usize,
    pub selected: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EdgeDto {
    pub from: String,
    pub to: String,
    pub weight: u64,
    pub bidirectional: bool,
    pub color_start: String,
    pub color_end: String,
    pub depth: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusDto {
    pub text: String,
    pub error: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClusterDto {
    pub package: String,
    pub members: Vec<String>,
}

impl From<&Status> for StatusDto {
    fn from(status: &Status) -> Self {
        StatusDto {
            text: status.text.clone(),
            error: status.is_error,
        }
    }
}

/// Only visible nodes and edges are sent to clients.
impl From<&BehaviorView> for ViewDto {
    fn from(view: &BehaviorView) -> Self {
        let nodes = view
            .visible_nodes()
            .map(|n| NodeDto {
                id: n.key.clone(),
                component: n.component.clone(),
                label: n.label.clone(),
                package: package_of(&n.component).to_string(),
                depth: n.depth,
                selected: n.selected,
            })
            .collect();

        let edges = view
            .visible_edges()
            .map(|e| EdgeDto {
                from: e.source.clone(),
                to: e.target.clone(),
                weight: e.weight,
                bidirectional: e.bidirectional,
                color_start: e.color_start.to_hex(),
                color_end: e.color_end.to_hex(),
                depth: e.depth,
            })
            .collect();

        let clusters = view
            .clusters
            .iter()
            .map(|c| ClusterDto {
                package: c.package.clone(),
                members: c.members.clone(),
            })
            .collect();

        ViewDto {
            mode: view.mode,
            nodes,
            edges,
            path_status: StatusDto::from(&view.path_status),
            trace_status: StatusDto::from(&view.trace_status),
            clusters,
        }
    }
}
