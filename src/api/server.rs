use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::api::dto::ViewDto;
use crate::application::Workspace;
use crate::domain::behavior::{BehaviorMode, BehaviorView, Session, Step, TraceMode};

#[derive(Debug, Deserialize)]
struct CommandReq {
    command: String,
    params: Option<Value>,
}

/// Per-connection state: the caller-owned session plus the last view sent,
/// which `TOGGLE` edits in place.
pub struct Connection<'a> {
    workspace: &'a Workspace,
    session: Session,
    view: Option<BehaviorView>,
}

impl<'a> Connection<'a> {
    pub fn new(workspace: &'a Workspace) -> Self {
        Self {
            session: workspace.new_session(),
            workspace,
            view: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn process_command(&mut self, json_str: &str) -> Result<Value> {
        let req: CommandReq = serde_json::from_str(json_str).context("Invalid JSON format")?;
        debug!(command = %req.command, "processing command");

        match req.command.as_str() {
            "PING" => return Ok(json!("PONG")),
            "SHUTDOWN" => return Ok(json!("Shutting down...")),
            "VIEW" => {
                if self.view.is_none() {
                    self.rebuild()?;
                }
            }
            "TOGGLE" => {
                let key = string_param(&req.params, "key")?;
                let view = self
                    .view
                    .as_mut()
                    .ok_or_else(|| anyhow!("No view to toggle; request VIEW first"))?;
                if !view.toggle(key) {
                    bail!("Unknown exploration node: {}", key);
                }
            }
            _ => {
                self.apply(&req)?;
                self.rebuild()?;
            }
        }

        self.current_view()
    }

    /// Apply a session-changing command.
    fn apply(&mut self, req: &CommandReq) -> Result<()> {
        let session = &mut self.session;
        match req.command.as_str() {
            "SELECT" => {
                let id = string_param(&req.params, "id")?;
                if self.workspace.hierarchy.lookup(id).is_none() {
                    bail!("Unknown component: {}", id);
                }
                session.select(id);
            }
            "DESELECT" => {
                session.deselect(string_param(&req.params, "id")?);
            }
            "CLEAR" => session.clear_selection(),
            "RESET" => session.reset(),
            "MODE" => {
                let mode = string_param(&req.params, "mode")?;
                session.mode =
                    BehaviorMode::from_str(mode).ok_or_else(|| anyhow!("Unknown mode: {}", mode))?;
            }
            "TRACE_MODE" => {
                let mode = string_param(&req.params, "mode")?;
                session.trace_mode =
                    TraceMode::from_str(mode).ok_or_else(|| anyhow!("Unknown trace mode: {}", mode))?;
            }
            "CLUSTERING" => {
                session.clustering = req
                    .params
                    .as_ref()
                    .and_then(|p| p.get("enabled"))
                    .and_then(Value::as_bool)
                    .ok_or_else(|| anyhow!("Missing 'enabled' param"))?;
            }
            "NEXT_PATH" => self.workspace.engine()?.step_path(session, Step::Forward),
            "PREV_PATH" => self.workspace.engine()?.step_path(session, Step::Backward),
            "NEXT_TRACE" => self.workspace.engine()?.step_trace(session, Step::Forward),
            "PREV_TRACE" => self.workspace.engine()?.step_trace(session, Step::Backward),
            "DEEPER" => session.deepen(),
            "SHALLOWER" => session.shallow(),
            _ => bail!("Unknown command: {}", req.command),
        }
        Ok(())
    }

    fn rebuild(&mut self) -> Result<()> {
        let view = self.workspace.engine()?.rebuild(&mut self.session);
        self.view = Some(view);
        Ok(())
    }

    fn current_view(&self) -> Result<Value> {
        let view = self
            .view
            .as_ref()
            .ok_or_else(|| anyhow!("No view available"))?;
        Ok(serde_json::to_value(ViewDto::from(view))?)
    }
}

fn string_param<'p>(params: &'p Option<Value>, name: &str) -> Result<&'p str> {
    params
        .as_ref()
        .and_then(|p| p.get(name))
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Missing '{}' param", name))
}

pub fn start_server(workspace: Arc<Workspace>, port: u16) -> Result<()> {
    let address = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&address)
        .with_context(|| format!("Failed to bind to {}", address))?;

    info!(%address, "API server listening");
    serve(listener, workspace)
}

/// Accept connections until a client sends `SHUTDOWN`.
pub fn serve(listener: TcpListener, workspace: Arc<Workspace>) -> Result<()> {
    let local = listener.local_addr()?;
    let shutdown = Arc::new(AtomicBool::new(false));

    for stream in listener.incoming() {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match stream {
            Ok(stream) => {
                let workspace = Arc::clone(&workspace);
                let shutdown = Arc::clone(&shutdown);
                thread::spawn(move || {
                    if let Err(e) = handle_connection(stream, &workspace, &shutdown, local) {
                        error!(error = %e, "connection error");
                    }
                });
            }
            Err(e) => warn!(error = %e, "accept error"),
        }
    }

    info!("API server stopped");
    Ok(())
}

fn handle_connection(
    mut stream: TcpStream,
    workspace: &Workspace,
    shutdown: &AtomicBool,
    local: SocketAddr,
) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut connection = Connection::new(workspace);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match connection.process_command(trimmed) {
            Ok(data) => json!({
                "status": "success",
                "data": data
            }),
            Err(e) => json!({
                "status": "error",
                "message": e.to_string()
            }),
        };

        let response_str = serde_json::to_string(&response)?;
        stream.write_all(response_str.as_bytes())?;
        stream.write_all(b"\n")?;

        let is_shutdown = serde_json::from_str::<CommandReq>(trimmed)
            .map(|req| req.command == "SHUTDOWN")
            .unwrap_or(false);
        if is_shutdown {
            info!("shutdown requested");
            shutdown.store(true, Ordering::SeqCst);
            // Wake the accept loop so it observes the flag.
            let _ = TcpStream::connect(local);
            break;
        }
    }
    Ok(())
}
