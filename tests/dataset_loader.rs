use std::fs;
use std::path::Path;

use codescape::application::{ExportUsecase, LoadUsecase};
use codescape::config::Config;
use codescape::domain::behavior::BehaviorMode;
use codescape::infrastructure::FileDataset;
use codescape::ports::dot_exporter::DotExporter;
use codescape::ports::{StructureSource, TraceSource};
use codescape::ModelError;
use tempfile::tempdir;

const STRUCTURE: &str = r#"{"elements": {
    "nodes": [
        {"data": {"id": "com", "properties": {"simpleName": "com", "kind": "package"}}},
        {"data": {"id": "com.app", "properties": {"simpleName": "app", "kind": "package"}}},
        {"data": {"id": "com.app.A", "properties": {"simpleName": "A", "kind": "class"}}},
        {"data": {"id": "com.app.B", "properties": {"simpleName": "B", "kind": "class"}}},
        {"data": {"id": "com.app.C", "properties": {"kind": "class"}}}
    ],
    "edges": [
        {"data": {"id": "e1", "source": "com", "target": "com.app", "label": "contains"}},
        {"data": {"id": "e2", "source": "com.app", "target": "com.app.A", "label": "contains"}},
        {"data": {"id": "e3", "source": "com.app", "target": "com.app.B", "label": "contains"}},
        {"data": {"id": "e4", "source": "com.app", "target": "com.app.C", "label": "contains"}},
        {"data": {"id": "e5", "source": "com.app.A", "target": "com.app.B", "label": "invokes", "properties": {"weight": 3}}}
    ]
}}"#;

const TRACE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<trace>
    <call class="com.app.A" count="5">
        <call class="java.lang.String" count="5">
            <call class="com.app.B" count="5">
                <call class="com.app.C" count="5"/>
            </call>
        </call>
    </call>
</trace>"#;

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn loads_structure_and_xml_trace() {
    let dir = tempdir().unwrap();
    let structure = write(dir.path(), "structure.json", STRUCTURE);
    let trace = write(dir.path(), "trace.xml", TRACE_XML);
    let dataset = FileDataset::new(&structure, Some(trace));

    let (nodes, edges) = dataset.load_structure().unwrap();
    assert_eq!(nodes.len(), 5);
    assert_eq!(nodes[4].name, "com.app.C");
    assert_eq!(edges[4].weight, Some(3));

    let raw = dataset.load_trace().unwrap();
    assert_eq!(raw.calls.len(), 1);
    assert_eq!(raw.calls[0].children[0].label, "java.lang.String");

    let workspace = LoadUsecase {
        structure: &dataset,
        traces: &dataset,
    }
    .run(Config::default())
    .unwrap();

    assert_eq!(workspace.hierarchy.root_component().id(), "com.app");
    let traces = workspace.traces.as_ref().unwrap();
    assert_eq!(traces.paths().len(), 1);
    assert_eq!(
        traces.paths()[0].sequence,
        vec!["com.app.A", "com.app.B", "com.app.C"]
    );
    assert!(workspace.trace_error.is_none());
}

#[test]
fn loads_json_trace_by_extension() {
    let dir = tempdir().unwrap();
    let structure = write(dir.path(), "structure.json", STRUCTURE);
    let trace = write(
        dir.path(),
        "trace.JSON",
        r#"{"calls": [{"class": "com.app.A", "count": 2, "children": [{"class": "com.app.B", "count": 2}]}]}"#,
    );
    let dataset = FileDataset::new(&structure, Some(trace));

    let raw = dataset.load_trace().unwrap();
    assert_eq!(raw.calls[0].children[0].count, 2);
}

#[test]
fn broken_trace_leaves_structure_usable() {
    let dir = tempdir().unwrap();
    let structure = write(dir.path(), "structure.json", STRUCTURE);
    let trace = write(dir.path(), "trace.xml", "<trace><call class=\"com.app.A\"></trace>");
    let dataset = FileDataset::new(&structure, Some(trace));

    assert!(matches!(dataset.load_trace(), Err(ModelError::TraceParse(_))));

    let workspace = LoadUsecase {
        structure: &dataset,
        traces: &dataset,
    }
    .run(Config::default())
    .unwrap();

    assert_eq!(workspace.hierarchy.len(), 5);
    assert!(workspace.traces.is_none());
    assert!(workspace.trace_error.is_some());
    let err = workspace.engine().err().unwrap();
    assert!(err.to_string().contains("No behavior data loaded"));
}

#[test]
fn missing_trace_path_is_reported() {
    let dir = tempdir().unwrap();
    let structure = write(dir.path(), "structure.json", STRUCTURE);
    let dataset = FileDataset::new(&structure, None);

    let workspace = LoadUsecase {
        structure: &dataset,
        traces: &dataset,
    }
    .run(Config::default())
    .unwrap();
    assert!(workspace.engine().is_err());
}

#[test]
fn structure_errors_are_fatal() {
    let dir = tempdir().unwrap();
    let structure = write(dir.path(), "structure.json", "{\"elements\": ");
    let dataset = FileDataset::new(&structure, None);
    assert!(matches!(dataset.load_structure(), Err(ModelError::Json(_))));

    let missing = FileDataset::new(dir.path().join("absent.json"), None);
    assert!(matches!(missing.load_structure(), Err(ModelError::Io(_))));

    let result = LoadUsecase {
        structure: &missing,
        traces: &missing,
    }
    .run(Config::default());
    assert!(result.is_err());
}

#[test]
fn config_drives_session_and_export() {
    let dir = tempdir().unwrap();
    let structure = write(dir.path(), "structure.json", STRUCTURE);
    let trace = write(dir.path(), "trace.xml", TRACE_XML);
    let config_path = write(
        dir.path(),
        "codescape.toml",
        "[trace]\ndefault_depth = 2\n\n[view]\nclustering = false\n",
    );
    let config = Config::discover(Some(&config_path)).unwrap();
    let dataset = FileDataset::new(&structure, Some(trace));

    let workspace = LoadUsecase {
        structure: &dataset,
        traces: &dataset,
    }
    .run(config)
    .unwrap();

    let mut session = workspace.new_session();
    assert_eq!(session.trace_depth(), 2);
    assert!(!session.clustering);
    session.mode = BehaviorMode::Trace;
    session.select("com.app.A");

    let output = dir.path().join("view.dot");
    let view = ExportUsecase { exporter: &DotExporter }
        .run(&workspace, &mut session, &output)
        .unwrap();
    assert_eq!(view.edges.len(), 2);

    let dot = fs::read_to_string(&output).unwrap();
    assert!(dot.contains("\"com.app.A\" -> \"com.app.B\""));
    assert!(dot.contains("\"com.app.B\" -> \"com.app.C\""));
    assert!(!dot.contains("subgraph"));
}
