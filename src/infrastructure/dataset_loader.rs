//! Dataset loading from disk.
//!
//! Structure datasets are JSON in the graph-export layout
//! (`elements.nodes[].data`, `elements.edges[].data`). Trace datasets are XML
//! where every element below the document root carries `class` and `count`
//! attributes; a `.json` trace file is read as a serialized [`RawTrace`].

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::structure::{StructureEdge, StructureNode};
use crate::domain::trace::{RawTrace, RawTraceNode};
use crate::error::{ModelError, Result};
use crate::ports::{StructureSource, TraceSource};

#[derive(Debug, Deserialize)]
struct HierarchyJson {
    elements: ElementData,
}

#[derive(Debug, Deserialize)]
struct ElementData {
    #[serde(default)]
    nodes: Vec<NodeJson>,
    #[serde(default)]
    edges: Vec<EdgeJson>,
}

#[derive(Debug, Deserialize)]
struct NodeJson {
    data: NodeData,
}

#[derive(Debug, Deserialize)]
struct NodeData {
    id: String,
    properties: NodeProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeProperties {
    #[serde(default)]
    simple_name: Option<String>,
    kind: String,
}

#[derive(Debug, Deserialize)]
struct EdgeJson {
    data: EdgeData,
}

#[derive(Debug, Deserialize)]
struct EdgeData {
    source: String,
    target: String,
    label: String,
    #[serde(default)]
    properties: Option<EdgeProperties>,
}

#[derive(Debug, Deserialize)]
struct EdgeProperties {
    #[serde(default)]
    weight: Option<u64>,
}

/// Parse the structural dataset from JSON bytes.
pub fn parse_structure(bytes: &[u8]) -> Result<(Vec<StructureNode>, Vec<StructureEdge>)> {
    let document: HierarchyJson = serde_json::from_slice(bytes)?;

    let nodes = document
        .elements
        .nodes
        .into_iter()
        .map(|node| {
            let data = node.data;
            StructureNode {
                name: data.properties.simple_name.unwrap_or_else(|| data.id.clone()),
                kind: data.properties.kind,
                id: data.id,
            }
        })
        .collect();

    let edges = document
        .elements
        .edges
        .into_iter()
        .map(|edge| StructureEdge {
            source: edge.data.source,
            target: edge.data.target,
            label: edge.data.label,
            weight: edge.data.properties.and_then(|p| p.weight),
        })
        .collect();

    Ok((nodes, edges))
}

/// Parse an XML trace document. The document element is the container; each
/// element below it is one trace record.
pub fn parse_trace_xml(text: &str) -> Result<RawTrace> {
    let document =
        roxmltree::Document::parse(text).map_err(|e| ModelError::TraceParse(e.to_string()))?;

    let calls = document
        .root_element()
        .children()
        .filter(|child| child.is_element())
        .map(parse_trace_element)
        .collect::<Result<Vec<_>>>()?;

    Ok(RawTrace { calls })
}

fn parse_trace_element(element: roxmltree::Node<'_, '_>) -> Result<RawTraceNode> {
    let pos = element.document().text_pos_at(element.range().start);
    let position = format!("{}:{}", pos.row, pos.col);
    let label = element.attribute("class").ok_or_else(|| {
        ModelError::TraceParse(format!("<{}> at {} has no class attribute", element.tag_name().name(), position))
    })?;
    let count = element
        .attribute("count")
        .ok_or_else(|| ModelError::TraceParse(format!("{} at {} has no count attribute", label, position)))?
        .trim()
        .parse::<u64>()
        .map_err(|e| ModelError::TraceParse(format!("{} at {} has an invalid count: {}", label, position, e)))?;

    let children = element
        .children()
        .filter(|child| child.is_element())
        .map(parse_trace_element)
        .collect::<Result<Vec<_>>>()?;

    Ok(RawTraceNode::new(label, count, children))
}

pub fn parse_trace_json(bytes: &[u8]) -> Result<RawTrace> {
    serde_json::from_slice(bytes).map_err(|e| ModelError::TraceParse(e.to_string()))
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path)?;
    // SAFETY: datasets are read once at startup and not modified while mapped.
    let mmap = unsafe { Mmap::map(&file)? };
    debug!(path = %path.display(), bytes = mmap.len(), "mapped dataset");
    Ok(mmap)
}

/// Dataset files on disk.
#[derive(Debug, Clone)]
pub struct FileDataset {
    pub structure_path: PathBuf,
    pub trace_path: Option<PathBuf>,
}

impl FileDataset {
    pub fn new(structure_path: impl Into<PathBuf>, trace_path: Option<PathBuf>) -> Self {
        Self {
            structure_path: structure_path.into(),
            trace_path,
        }
    }
}

impl StructureSource for FileDataset {
    fn load_structure(&self) -> Result<(Vec<StructureNode>, Vec<StructureEdge>)> {
        info!(path = %self.structure_path.display(), "loading structure dataset");
        let mmap = map_file(&self.structure_path)?;
        parse_structure(&mmap)
    }
}

impl TraceSource for FileDataset {
    fn load_trace(&self) -> Result<RawTrace> {
        let path = self
            .trace_path
            .as_ref()
            .ok_or_else(|| ModelError::TraceParse("no trace dataset given".to_string()))?;
        info!(path = %path.display(), "loading trace dataset");

        let mmap = map_file(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            return parse_trace_json(&mmap);
        }

        let text = std::str::from_utf8(&mmap)
            .map_err(|e| ModelError::TraceParse(format!("{} is not UTF-8: {}", path.display(), e)))?;
        parse_trace_xml(text)
    }
}
