use std::path::Path;

use diagram_layout::config::Config;
use diagram_layout::ir::{DiagramType, LayoutRequest};
use diagram_layout::layout::geometry::distance;
use diagram_layout::layout::{
    LayoutResult, Point, PositionedNode, StageContext, compute_layout, count_overlaps,
    resolve_overlaps, route_edges,
};

const ENDPOINT_TOLERANCE: f32 = 1.0;

fn load_fixture(path: &Path) -> LayoutRequest {
    let input = std::fs::read_to_string(path).expect("fixture read failed");
    serde_json::from_str(&input).expect("fixture parse failed")
}

fn assert_valid_layout(result: &LayoutResult, request: &LayoutRequest, config: &Config, fixture: &str) {
    assert!(result.success, "{fixture}: {:?}", result.error);
    assert_eq!(count_overlaps(&result.nodes), 0, "{fixture}: overlapping nodes");

    let ids: Vec<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
    let expected: Vec<&str> = request.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, expected, "{fixture}: node order changed");
    assert_eq!(result.edges.len(), request.edges.len(), "{fixture}: edge count changed");

    for edge in &result.edges {
        assert!(edge.points.len() >= 2, "{fixture}: edge with fewer than two points");
        let from = result.node(&edge.from).expect("from node");
        let to = result.node(&edge.to).expect("to node");
        let first = edge.points[0];
        let last = edge.points[edge.points.len() - 1];
        assert!(
            from.rect().contains_point(first, ENDPOINT_TOLERANCE),
            "{fixture}: edge {}->{} starts off its source",
            edge.from,
            edge.to
        );
        assert!(
            to.rect().contains_point(last, ENDPOINT_TOLERANCE),
            "{fixture}: edge {}->{} ends off its target",
            edge.from,
            edge.to
        );
    }

    assert!(result.bounds.width <= config.layout.width, "{fixture}: too wide");
    assert!(result.bounds.height <= config.layout.height, "{fixture}: too tall");
    assert!(result.confidence >= 0.8, "{fixture}: confidence {}", result.confidence);
    assert!((0.0..=1.0).contains(&result.confidence));
}

#[test]
fn layout_all_fixtures() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures");

    // Keep this list explicit so new archetype fixtures must be added intentionally.
    let candidates = [
        ("flow/basic.json", DiagramType::Flow),
        ("flow/multi_edges.json", DiagramType::Flow),
        ("tree/basic.json", DiagramType::Tree),
        ("timeline/basic.json", DiagramType::Timeline),
        ("cycle/basic.json", DiagramType::Cycle),
        ("matrix/basic.json", DiagramType::Matrix),
    ];

    let config = Config::seeded(2024);
    for (rel, kind) in candidates {
        let path = root.join(rel);
        assert!(path.exists(), "fixture missing: {}", rel);
        let request = load_fixture(&path);
        assert_eq!(request.diagram_type, kind, "{rel}: wrong archetype");
        let result = compute_layout(&request, &config);
        assert_valid_layout(&result, &request, &config, rel);
    }
}

#[test]
fn layered_pass_is_used_for_hierarchical_fixtures() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures");
    let request = load_fixture(&root.join("tree/basic.json"));
    let result = compute_layout(&request, &Config::seeded(1));
    assert!(result.metrics.used_layered);
    let ceo = result.node("ceo").unwrap().center().y;
    let eng = result.node("eng").unwrap().center().y;
    assert!(ceo < eng, "root should sit above its grandchildren");
}

#[test]
fn five_flow_nodes_with_shared_start_resolve() {
    let config = Config::seeded(5);
    let mut ctx = StageContext::new(&config, DiagramType::Flow);
    let nodes = vec![
        PositionedNode::boxed("a", 600.0, 200.0, 120.0, 60.0),
        PositionedNode::boxed("b", 600.0, 200.0, 120.0, 60.0),
        PositionedNode::boxed("c", 600.0, 320.0, 120.0, 60.0),
        PositionedNode::boxed("d", 600.0, 440.0, 120.0, 60.0),
        PositionedNode::boxed("e", 600.0, 560.0, 120.0, 60.0),
    ];
    let (nodes, _) = resolve_overlaps(nodes, &mut ctx);
    assert_eq!(count_overlaps(&nodes), 0);

    let mut request = LayoutRequest::new(DiagramType::Flow);
    for id in ["a", "b", "c", "d", "e"] {
        request.node(id, id);
    }
    request.edge("a", "c").edge("b", "c").edge("c", "d").edge("d", "e");
    let result = compute_layout(&request, &config);
    assert!(result.success);
    assert_eq!(result.metrics.overlap_count, 0);
    assert!(result.confidence >= 0.8);
}

#[test]
fn twenty_cycle_nodes_stay_near_the_ring() {
    let config = Config::seeded(20);
    let mut request = LayoutRequest::new(DiagramType::Cycle);
    for idx in 0..20 {
        request.node(&format!("s{idx}"), &format!("Stage {idx}"));
    }
    for idx in 0..20 {
        request.edge(&format!("s{idx}"), &format!("s{}", (idx + 1) % 20));
    }
    let result = compute_layout(&request, &config);
    assert!(result.success);
    assert_eq!(count_overlaps(&result.nodes), 0);

    let (cx, cy) = config.layout.center();
    let radius = config.layout.cycle_radius();
    let tolerance = radius * 0.25;
    for node in &result.nodes {
        let r = distance(node.center(), Point::new(cx, cy));
        assert!(
            (r - radius).abs() <= tolerance,
            "{} sits {r} from the center, ring radius {radius}",
            node.id
        );
    }
}

#[test]
fn unknown_node_fails_cleanly() {
    let mut request = LayoutRequest::new(DiagramType::Tree);
    request.node("root", "Root").edge("root", "missing");
    let result = compute_layout(&request, &Config::seeded(1));
    assert!(!result.success);
    assert!(result.nodes.is_empty());
    assert_eq!(result.confidence, 0.0);
    let error = result.error.unwrap_or_default();
    assert!(error.contains("unknown node"), "{error}");
}

#[test]
fn dense_matrix_cluster_resolves_within_budget() {
    let config = Config::seeded(40);
    let mut ctx = StageContext::new(&config, DiagramType::Matrix);
    // 40 boxes crammed into a 400x300 region
    let nodes: Vec<PositionedNode> = (0..40)
        .map(|idx| {
            let x = 300.0 + (idx % 8) as f32 * 35.0;
            let y = 200.0 + (idx / 8) as f32 * 48.0;
            PositionedNode::boxed(format!("m{idx}"), x, y, 120.0, 60.0)
        })
        .collect();
    let (nodes, _) = resolve_overlaps(nodes, &mut ctx);
    assert_eq!(nodes.len(), 40);
    assert_eq!(count_overlaps(&nodes), 0);
    assert!(ctx.deadline.elapsed_ms() < config.engine.time_budget_ms as f64);
}

#[test]
fn empty_and_single_node_graphs() {
    let config = Config::seeded(1);
    let empty = compute_layout(&LayoutRequest::new(DiagramType::Cycle), &config);
    assert!(!empty.success);
    assert_eq!(empty.bounds.width, 0.0);

    let mut single = LayoutRequest::new(DiagramType::Cycle);
    single.node("only", "Only node");
    let result = compute_layout(&single, &config);
    assert!(result.success);
    assert_eq!(result.nodes.len(), 1);
    assert!(result.bounds.width > 0.0 && result.bounds.width <= config.layout.width);
}

#[test]
fn fifty_node_flow_stays_inside_time_budget() {
    let config = Config::seeded(50);
    let mut request = LayoutRequest::new(DiagramType::Flow);
    for idx in 0..50 {
        request.node(&format!("n{idx}"), &format!("Node {idx}"));
    }
    for idx in 1..50 {
        request.edge(&format!("n{}", idx / 2), &format!("n{idx}"));
    }
    let result = compute_layout(&request, &config);
    assert!(result.success);
    assert_eq!(result.metrics.overlap_count, 0);
    assert!(result.processing_time_ms < config.engine.time_budget_ms as f64);
    assert!(result.metrics.compliance.within_time_budget);
}

#[test]
fn rerouting_finished_layout_is_idempotent() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures");
    let request = load_fixture(&root.join("flow/multi_edges.json"));
    let config = Config::seeded(3);
    let result = compute_layout(&request, &config);
    let rerouted = route_edges(&result.nodes, &request.edges, &config.layout);
    assert_eq!(rerouted, result.edges);
}

#[test]
fn result_serializes_with_camel_case_envelope() {
    let mut request = LayoutRequest::new(DiagramType::Timeline);
    request.node("a", "A").node("b", "B").edge("a", "b");
    let result = compute_layout(&request, &Config::seeded(1));
    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("processingTimeMs").is_some());
    assert_eq!(json["success"], true);
    assert!(json["bounds"].get("minX").is_some());
    assert_eq!(json["nodes"].as_array().map(Vec::len), Some(2));
}
