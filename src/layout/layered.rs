use std::any::Any;
use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};

use dagre_rust::{
    GraphConfig as DagreConfig, GraphEdge as DagreEdge, GraphNode as DagreNode,
    layout as dagre_layout,
};
use graphlib_rust::{Graph as DagreGraph, GraphOption};

use crate::config::{LayoutConfig, RankDirection};
use crate::ir::EdgeSpec;

use super::error::LayoutError;
use super::geometry::Point;
use super::types::PositionedNode;

fn layered_error(message: impl Into<String>) -> LayoutError {
    LayoutError::Internal {
        stage: "layered",
        message: message.into(),
    }
}

/// Hierarchical placement through dagre, then fitted into the canvas.
///
/// Multi-edges are collapsed and self-loops skipped before ranking. Any dagre
/// failure (including a panic) comes back as an error so the caller can fall
/// back to the closed-form strategy.
pub(super) fn layered_layout(
    mut nodes: Vec<PositionedNode>,
    edges: &[EdgeSpec],
    config: &LayoutConfig,
) -> Result<Vec<PositionedNode>, LayoutError> {
    if nodes.is_empty() {
        return Err(layered_error("no nodes to rank"));
    }

    let centers = catch_unwind(AssertUnwindSafe(|| run_dagre(&nodes, edges, config)))
        .map_err(|payload| layered_error(panic_message(payload.as_ref())))?;

    for (node, center) in nodes.iter_mut().zip(centers) {
        let Some(center) = center else {
            return Err(layered_error(format!("dagre dropped node `{}`", node.id)));
        };
        if !center.is_finite() {
            return Err(layered_error(format!(
                "dagre produced a non-finite position for `{}`",
                node.id
            )));
        }
        node.set_center(center);
    }

    Ok(fit_to_canvas(nodes, config))
}

fn run_dagre(nodes: &[PositionedNode], edges: &[EdgeSpec], config: &LayoutConfig) -> Vec<Option<Point>> {
    let mut dagre_graph: DagreGraph<DagreConfig, DagreNode, DagreEdge> =
        DagreGraph::new(Some(GraphOption {
            directed: Some(true),
            multigraph: Some(false),
            compound: Some(false),
        }));

    let mut graph_config = DagreConfig::default();
    graph_config.rankdir = Some(dagre_rankdir(config.rank_direction).to_string());
    graph_config.nodesep = Some(config.node_separation);
    graph_config.ranksep = Some(config.rank_separation);
    graph_config.marginx = Some(config.margin_x);
    graph_config.marginy = Some(config.margin_y);
    dagre_graph.set_graph(graph_config);

    for node in nodes {
        let mut dagre_node = DagreNode::default();
        dagre_node.width = node.w;
        dagre_node.height = node.h;
        dagre_graph.set_node(node.id.clone(), Some(dagre_node));
    }

    let mut edge_set: HashSet<(&str, &str)> = HashSet::new();
    for edge in edges {
        if edge.is_self_loop() || !edge_set.insert((edge.from.as_str(), edge.to.as_str())) {
            continue;
        }
        let _ = dagre_graph.set_edge(&edge.from, &edge.to, Some(DagreEdge::default()), None);
    }

    dagre_layout::run_layout(&mut dagre_graph);

    nodes
        .iter()
        .map(|node| {
            dagre_graph
                .node(&node.id)
                .map(|dagre_node| Point::new(dagre_node.x, dagre_node.y))
        })
        .collect()
}

fn dagre_rankdir(direction: RankDirection) -> &'static str {
    match direction {
        RankDirection::TopBottom => "tb",
        RankDirection::LeftRight => "lr",
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("dagre panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("dagre panicked: {message}")
    } else {
        "dagre panicked".to_string()
    }
}

/// Centers the drawing in the usable area; an axis that does not fit has its
/// centers compressed proportionally (box sizes are left alone).
pub(super) fn fit_to_canvas(mut nodes: Vec<PositionedNode>, config: &LayoutConfig) -> Vec<PositionedNode> {
    if nodes.is_empty() {
        return nodes;
    }
    let xs: Vec<(f32, f32)> = nodes.iter().map(|n| (n.center().x, n.w / 2.0)).collect();
    let ys: Vec<(f32, f32)> = nodes.iter().map(|n| (n.center().y, n.h / 2.0)).collect();
    let new_xs = fit_axis(&xs, config.margin_x, config.usable_width());
    let new_ys = fit_axis(&ys, config.margin_y, config.usable_height());
    for ((node, cx), cy) in nodes.iter_mut().zip(new_xs).zip(new_ys) {
        node.set_center(Point::new(cx, cy));
    }
    nodes
}

/// `items` are `(center, half_extent)` pairs along one axis.
pub(super) fn fit_axis(items: &[(f32, f32)], start: f32, len: f32) -> Vec<f32> {
    let lo = items.iter().map(|(c, half)| c - half).fold(f32::INFINITY, f32::min);
    let hi = items.iter().map(|(c, half)| c + half).fold(f32::NEG_INFINITY, f32::max);
    if hi - lo <= len {
        let shift = start + (len - (hi - lo)) / 2.0 - lo;
        return items.iter().map(|(c, _)| c + shift).collect();
    }

    let c_min = items.iter().map(|(c, _)| *c).fold(f32::INFINITY, f32::min);
    let c_max = items.iter().map(|(c, _)| *c).fold(f32::NEG_INFINITY, f32::max);
    let max_half = items.iter().map(|(_, half)| *half).fold(0.0f32, f32::max);
    let avail = (len - 2.0 * max_half).max(0.0);
    let scale = if c_max > c_min { avail / (c_max - c_min) } else { 0.0 };
    items
        .iter()
        .map(|(c, _)| start + max_half + (c - c_min) * scale)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxes(ids: &[&str]) -> Vec<PositionedNode> {
        ids.iter()
            .map(|id| PositionedNode::boxed(*id, 0.0, 0.0, 120.0, 60.0))
            .collect()
    }

    #[test]
    fn chain_is_ranked_top_to_bottom() {
        let config = LayoutConfig::default();
        let edges = vec![EdgeSpec::new("a", "b"), EdgeSpec::new("b", "c")];
        let placed = layered_layout(boxes(&["a", "b", "c"]), &edges, &config).unwrap();
        assert!(placed[0].center().y < placed[1].center().y);
        assert!(placed[1].center().y < placed[2].center().y);
    }

    #[test]
    fn left_right_direction_ranks_along_x() {
        let mut config = LayoutConfig::default();
        config.rank_direction = RankDirection::LeftRight;
        let edges = vec![EdgeSpec::new("a", "b")];
        let placed = layered_layout(boxes(&["a", "b"]), &edges, &config).unwrap();
        assert!(placed[0].center().x < placed[1].center().x);
    }

    #[test]
    fn self_loops_and_multi_edges_are_tolerated() {
        let config = LayoutConfig::default();
        let edges = vec![
            EdgeSpec::new("a", "a"),
            EdgeSpec::new("a", "b"),
            EdgeSpec::new("a", "b"),
        ];
        let placed = layered_layout(boxes(&["a", "b"]), &edges, &config).unwrap();
        assert!(placed.iter().all(PositionedNode::is_finite));
    }

    #[test]
    fn empty_input_is_an_error() {
        let config = LayoutConfig::default();
        assert!(layered_layout(Vec::new(), &[], &config).is_err());
    }

    #[test]
    fn fit_axis_centers_small_drawings() {
        let out = fit_axis(&[(0.0, 10.0), (40.0, 10.0)], 100.0, 200.0);
        // span [-10, 50] is 60 wide, centered in [100, 300]
        assert_eq!(out, vec![180.0, 220.0]);
    }

    #[test]
    fn fit_axis_compresses_wide_drawings() {
        let out = fit_axis(&[(0.0, 10.0), (1000.0, 10.0), (500.0, 10.0)], 0.0, 100.0);
        for (got, want) in out.iter().zip([10.0, 90.0, 50.0]) {
            assert!((got - want).abs() < 1e-3, "{got} != {want}");
        }
    }
}
