use codescape::domain::behavior::{BehaviorEngine, BehaviorMode, BehaviorView, Session, TraceMode};
use codescape::domain::component::Hierarchy;
use codescape::domain::exploration::{explore_key, ExplorationGraph};
use codescape::domain::palette::Rgb;
use codescape::domain::structure::{StructureBuilder, StructureEdge, StructureNode};
use codescape::domain::trace::{RawTrace, RawTraceNode, TraceBuilder, TraceModel};
use codescape::ports::dot_exporter::DotExporter;

const ROOT: &str = "app";

fn id(name: &str) -> String {
    format!("{}.{}", ROOT, name)
}

fn hierarchy() -> Hierarchy {
    let mut nodes = vec![StructureNode {
        id: ROOT.into(),
        kind: "package".into(),
        name: ROOT.into(),
    }];
    let mut edges = Vec::new();
    for name in ["A", "B", "C", "D"] {
        nodes.push(StructureNode {
            id: id(name),
            kind: "class".into(),
            name: name.into(),
        });
        edges.push(StructureEdge {
            source: ROOT.into(),
            target: id(name),
            label: "contains".into(),
            weight: None,
        });
    }
    StructureBuilder::build(&nodes, &edges).unwrap()
}

fn call(name: &str, count: u64, children: Vec<RawTraceNode>) -> RawTraceNode {
    RawTraceNode::new(id(name), count, children)
}

fn model(calls: Vec<RawTraceNode>) -> TraceModel {
    TraceBuilder::new(ROOT).build(RawTrace { calls }).unwrap()
}

/// A calls B and C; both of them call D.
fn diamond() -> TraceModel {
    model(vec![call(
        "A",
        1,
        vec![
            call("B", 2, vec![call("D", 3, vec![])]),
            call("C", 4, vec![call("D", 5, vec![])]),
        ],
    )])
}

fn explore(hierarchy: &Hierarchy, traces: &TraceModel, selected: &str) -> (BehaviorView, Session) {
    let engine = BehaviorEngine::new(hierarchy, traces);
    let mut session = Session::default();
    session.mode = BehaviorMode::Trace;
    session.trace_mode = TraceMode::Explore;
    session.clustering = false;
    session.select(id(selected));
    let view = engine.rebuild(&mut session);
    (view, session)
}

fn visible_keys(view: &BehaviorView) -> Vec<String> {
    view.visible_nodes().map(|n| n.key.clone()).collect()
}

fn visible_edges(view: &BehaviorView) -> Vec<(String, String)> {
    view.visible_edges()
        .map(|e| (e.source.clone(), e.target.clone()))
        .collect()
}

#[test]
fn exploration_starts_with_only_the_origin() {
    let hierarchy = hierarchy();
    let traces = diamond();
    let (view, session) = explore(&hierarchy, &traces, "A");

    let graph = view.exploration.as_ref().unwrap();
    assert_eq!(graph.len(), 4);
    assert_eq!(view.nodes.len(), 4);
    assert_eq!(view.edges.len(), 4);

    assert_eq!(visible_keys(&view), vec![id("A")]);
    assert!(visible_edges(&view).is_empty());
    assert_eq!(view.trace_status.text, "Trace: 1/1");
    assert!(session.active_trace().is_some());
    assert!(view.node(&id("A")).unwrap().selected);
}

#[test]
fn shared_child_stays_until_every_parent_closes() {
    let hierarchy = hierarchy();
    let traces = diamond();
    let (mut view, _) = explore(&hierarchy, &traces, "A");
    let b = explore_key(&id("B"), 1);
    let c = explore_key(&id("C"), 1);
    let d = explore_key(&id("D"), 2);
    assert_eq!(d, "app.D@2");

    assert!(view.toggle(&id("A")));
    assert_eq!(visible_keys(&view), vec![id("A"), b.clone(), c.clone()]);
    assert_eq!(visible_edges(&view).len(), 2);

    assert!(view.toggle(&b));
    assert!(view.toggle(&c));
    assert!(visible_keys(&view).contains(&d));
    assert_eq!(visible_edges(&view).len(), 4);

    // D keeps one open parent.
    assert!(view.toggle(&b));
    assert!(visible_keys(&view).contains(&d));
    assert!(!visible_edges(&view).contains(&(b.clone(), d.clone())));
    assert!(visible_edges(&view).contains(&(c.clone(), d.clone())));

    assert!(view.toggle(&c));
    assert!(!visible_keys(&view).contains(&d));
    assert_eq!(visible_keys(&view), vec![id("A"), b, c]);
}

#[test]
fn closing_origin_hides_whole_tree() {
    let hierarchy = hierarchy();
    let traces = diamond();
    let (mut view, _) = explore(&hierarchy, &traces, "A");

    view.toggle(&id("A"));
    view.toggle(&explore_key(&id("B"), 1));
    view.toggle(&id("A"));

    assert_eq!(visible_keys(&view), vec![id("A")]);
    assert!(visible_edges(&view).is_empty());
}

#[test]
fn toggle_rejects_unknown_keys() {
    let hierarchy = hierarchy();
    let traces = diamond();
    let (mut view, _) = explore(&hierarchy, &traces, "A");
    assert!(!view.toggle("app.Missing@3"));

    let engine = BehaviorEngine::new(&hierarchy, &traces);
    let mut session = Session::default();
    session.mode = BehaviorMode::Trace;
    session.select(id("A"));
    let mut depth_view = engine.rebuild(&mut session);
    assert!(depth_view.exploration.is_none());
    assert!(!depth_view.toggle(&id("A")));
}

#[test]
fn recursive_calls_get_distinct_nodes_per_depth() {
    let hierarchy = hierarchy();
    let traces = model(vec![call("A", 1, vec![call("B", 1, vec![call("A", 1, vec![call("C", 1, vec![])])])])]);
    let (view, _) = explore(&hierarchy, &traces, "A");

    let keys: Vec<&str> = view.nodes.iter().map(|n| n.key.as_str()).collect();
    assert_eq!(keys, vec!["app.A", "app.B@1", "app.A@2", "app.C@3"]);
    assert_eq!(view.node("app.A@2").unwrap().component, id("A"));
    assert_eq!(view.node("app.A@2").unwrap().depth, 2);

    // Colors advance in steps of one third along the chain.
    let third = Rgb::GREEN.lerp(Rgb::RED, 1.0 / 3.0);
    assert_eq!(view.edges[0].color_start, Rgb::GREEN);
    assert_eq!(view.edges[0].color_end, third);
    assert_eq!(view.edges[2].color_end, Rgb::RED);
}

#[test]
fn explore_without_trace_shows_selection() {
    let hierarchy = hierarchy();
    let traces = diamond();
    let (view, session) = explore(&hierarchy, &traces, "D");

    assert!(view.exploration.is_none());
    assert_eq!(view.nodes.len(), 1);
    assert!(view.trace_status.is_error);
    assert!(session.active_trace().is_none());
}

#[test]
fn exported_view_omits_hidden_nodes() {
    let hierarchy = hierarchy();
    let traces = diamond();
    let (mut view, _) = explore(&hierarchy, &traces, "A");
    view.toggle(&id("A"));

    let dot = DotExporter::to_dot(&view);
    assert!(dot.contains("\"app.B@1\""));
    assert!(!dot.contains("\"app.D@2\""));
}

#[test]
fn graph_links_are_deduplicated() {
    let mut graph = ExplorationGraph::new();
    let a = graph.spawn("app.A", 0);
    let b = graph.spawn("app.B", 1);
    assert_eq!(graph.spawn("app.B", 1), b);

    graph.connect(a, b, 1, (Rgb::GREEN, Rgb::RED));
    graph.connect(a, b, 2, (Rgb::GREEN, Rgb::RED));
    assert_eq!(graph.node(a).children, vec![b]);
    assert_eq!(graph.node(b).parents, vec![a]);
    assert_eq!(graph.lookup("app.B", 1), Some(b));
    assert_eq!(graph.find_key("app.B@1"), Some(b));
}
