// Command-line entry point for Codescape.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use codescape::api::dto::ViewDto;
use codescape::api::server;
use codescape::application::{ExportUsecase, LoadUsecase, Workspace};
use codescape::config::Config;
use codescape::domain::behavior::{BehaviorMode, Step, TraceMode};
use codescape::domain::component::RelationKind;
use codescape::infrastructure::{concurrency, FileDataset};
use codescape::ports::dot_exporter::DotExporter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./codescape.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct Datasets {
    /// Structural hierarchy dataset (JSON)
    #[arg(short, long)]
    structure: PathBuf,

    /// Execution trace dataset (XML, or JSON with a .json extension)
    #[arg(short, long)]
    trace: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print model statistics
    Summary {
        #[command(flatten)]
        datasets: Datasets,
    },
    /// Print the merged call paths
    Paths {
        #[command(flatten)]
        datasets: Datasets,
    },
    /// Compute a behavior view for a selection
    View {
        #[command(flatten)]
        datasets: Datasets,

        /// Selected component identifiers
        #[arg(short = 'S', long = "select", required = true)]
        select: Vec<String>,

        /// Behavior mode (aggregation, path, trace)
        #[arg(short, long, default_value = "aggregation")]
        mode: String,

        /// Trace sub-mode (depth, explore)
        #[arg(long, default_value = "depth")]
        trace_mode: String,

        /// Trace depth (defaults to the configured value)
        #[arg(short, long)]
        depth: Option<usize>,

        /// Steps through paths or trace occurrences before rendering
        #[arg(long, default_value_t = 0)]
        skip: usize,

        /// Disable package clustering
        #[arg(long)]
        no_clustering: bool,

        /// Output file path; prints to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (dot, json)
        #[arg(short, long, default_value = "dot")]
        format: String,
    },
    /// List calls and specializations between the children of a component
    Relations {
        #[command(flatten)]
        datasets: Datasets,

        /// Component whose children are inspected (defaults to the root)
        #[arg(long)]
        component: Option<String>,
    },
    /// Start the JSON command server
    Serve {
        #[command(flatten)]
        datasets: Datasets,

        #[arg(short, long, default_value_t = 7878)]
        port: u16,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(datasets: &Datasets, config: Config) -> Result<Workspace> {
    let dataset = FileDataset::new(&datasets.structure, datasets.trace.clone());
    let usecase = LoadUsecase {
        structure: &dataset,
        traces: &dataset,
    };
    usecase.run(config)
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::discover(cli.config.as_deref())?;
    concurrency::init_thread_pool(config.runtime.workers)?;

    match cli.command {
        Command::Summary { datasets } => {
            let workspace = load(&datasets, config)?;
            let hierarchy = &workspace.hierarchy;
            let root = hierarchy.root_component();
            println!("Root: {} ({})", root.id(), root.kind().label());
            println!("Components: {}", hierarchy.len());
            println!("Leaves under root: {}", root.indirect_children_count());
            match &workspace.traces {
                Some(traces) => {
                    println!("Trace nodes: {}", traces.node_count());
                    println!("Paths: {}", traces.paths().len());
                    println!("Traced classes: {}", traces.traces().len());
                }
                None => println!(
                    "Trace: unavailable ({})",
                    workspace.trace_error.as_deref().unwrap_or("no trace dataset given")
                ),
            }
        }
        Command::Paths { datasets } => {
            let workspace = load(&datasets, config)?;
            let traces = workspace
                .traces
                .as_ref()
                .context("No trace model loaded")?;
            print!("{}", traces.paths_report());
        }
        Command::View {
            datasets,
            select,
            mode,
            trace_mode,
            depth,
            skip,
            no_clustering,
            output,
            format,
        } => {
            let workspace = load(&datasets, config)?;
            let engine = workspace.engine()?;
            let mut session = workspace.new_session();
            session.mode = BehaviorMode::from_str(&mode).with_context(|| format!("Unknown mode: {}", mode))?;
            session.trace_mode = TraceMode::from_str(&trace_mode)
                .with_context(|| format!("Unknown trace mode: {}", trace_mode))?;
            if let Some(depth) = depth {
                session.set_trace_depth(depth);
            }
            if no_clustering {
                session.clustering = false;
            }
            for id in &select {
                if workspace.hierarchy.lookup(id).is_none() {
                    bail!("Unknown component: {}", id);
                }
                session.select(id.as_str());
            }

            // Resolve the cursors once before stepping.
            engine.rebuild(&mut session);
            for _ in 0..skip {
                match session.mode {
                    BehaviorMode::Path => engine.step_path(&mut session, Step::Forward),
                    BehaviorMode::Trace => engine.step_trace(&mut session, Step::Forward),
                    BehaviorMode::Aggregation => {}
                }
            }

            match format.as_str() {
                "dot" => match output {
                    Some(path) => {
                        let usecase = ExportUsecase { exporter: &DotExporter };
                        usecase.run(&workspace, &mut session, &path)?;
                        info!(path = %path.display(), "view exported");
                        println!("View written to {}", path.display());
                    }
                    None => println!("{}", DotExporter::to_dot(&engine.rebuild(&mut session))),
                },
                "json" => {
                    let view = engine.rebuild(&mut session);
                    let json = serde_json::to_string_pretty(&ViewDto::from(&view))?;
                    match output {
                        Some(path) => std::fs::write(&path, json)
                            .with_context(|| format!("Failed to write {}", path.display()))?,
                        None => println!("{}", json),
                    }
                }
                other => bail!("Unknown format: {}", other),
            }
        }
        Command::Relations { datasets, component } => {
            let workspace = load(&datasets, config)?;
            let hierarchy = &workspace.hierarchy;
            let id = match &component {
                Some(name) => hierarchy
                    .lookup(name)
                    .with_context(|| format!("Unknown component: {}", name))?,
                None => hierarchy.root(),
            };
            for (kind, arrow) in [(RelationKind::Calls, "calls"), (RelationKind::Specializes, "specializes")] {
                for relation in hierarchy.relations(id, kind) {
                    println!(
                        "{} {} {} ({})",
                        hierarchy.get(relation.source).id(),
                        arrow,
                        hierarchy.get(relation.target).id(),
                        relation.weight
                    );
                }
            }
        }
        Command::Serve { datasets, port } => {
            let workspace = load(&datasets, config)?;
            server::start_server(Arc::new(workspace), port)?;
        }
    }

    Ok(())
}
