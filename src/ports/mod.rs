use std::path::Path;

use crate::domain::behavior::BehaviorView;
use crate::domain::structure::{StructureEdge, StructureNode};
use crate::domain::trace::RawTrace;
use crate::error::Result;

pub mod dot_exporter;

/// Supplies the node and edge records of the structural dataset.
pub trait StructureSource {
    fn load_structure(&self) -> Result<(Vec<StructureNode>, Vec<StructureEdge>)>;
}

/// Supplies the raw execution trace.
pub trait TraceSource {
    fn load_trace(&self) -> Result<RawTrace>;
}

pub trait ViewExporter {
    fn export(&self, view: &BehaviorView, path: &Path) -> std::io::Result<()>;
}
