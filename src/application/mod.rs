use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tracing::warn;

use crate::config::Config;
use crate::domain::behavior::{BehaviorEngine, BehaviorView, Session};
use crate::domain::component::Hierarchy;
use crate::domain::structure::StructureBuilder;
use crate::domain::trace::{TraceBuilder, TraceModel};
use crate::ports::{StructureSource, TraceSource, ViewExporter};

/// Loaded models. The trace model is optional: a broken trace dataset still
/// leaves the structure usable.
#[derive(Debug)]
pub struct Workspace {
    pub config: Config,
    pub hierarchy: Hierarchy,
    pub traces: Option<TraceModel>,
    pub trace_error: Option<String>,
}

impl Workspace {
    /// Engine over both models; fails when no trace model was loaded.
    pub fn engine(&self) -> Result<BehaviorEngine<'_>> {
        let traces = self.traces.as_ref().ok_or_else(|| {
            anyhow!(
                "No behavior data loaded: {}",
                self.trace_error.as_deref().unwrap_or("no trace dataset given")
            )
        })?;
        Ok(BehaviorEngine::new(&self.hierarchy, traces).with_palette(self.config.palette))
    }

    /// A fresh session honoring the configured defaults.
    pub fn new_session(&self) -> Session {
        let mut session = Session::new(self.config.trace.default_depth);
        session.clustering = self.config.view.clustering;
        session
    }
}

pub struct LoadUsecase<'a> {
    pub structure: &'a dyn StructureSource,
    pub traces: &'a dyn TraceSource,
}

impl<'a> LoadUsecase<'a> {
    pub fn run(&self, config: Config) -> Result<Workspace> {
        let (nodes, edges) = self
            .structure
            .load_structure()
            .context("Failed to load structure dataset")?;
        let hierarchy =
            StructureBuilder::build(&nodes, &edges).context("Failed to build structure hierarchy")?;

        let builder = TraceBuilder::new(hierarchy.root_component().id())
            .with_synthetic_marker(config.trace.synthetic_marker.clone());
        let (traces, trace_error) = match self.traces.load_trace().and_then(|raw| builder.build(raw)) {
            Ok(model) => (Some(model), None),
            Err(e) => {
                warn!(error = %e, "trace model unavailable, continuing with structure only");
                (None, Some(e.to_string()))
            }
        };

        Ok(Workspace {
            config,
            hierarchy,
            traces,
            trace_error,
        })
    }
}

pub struct ExportUsecase<'a> {
    pub exporter: &'a dyn ViewExporter,
}

impl<'a> ExportUsecase<'a> {
    pub fn run(&self, workspace: &Workspace, session: &mut Session, export_path: &Path) -> Result<BehaviorView> {
        let view = workspace.engine()?.rebuild(session);
        self.exporter
            .export(&view, export_path)
            .with_context(|| format!("Failed to write {}", export_path.display()))?;
        Ok(view)
    }
}
