use std::collections::HashMap;

use crate::config::{LayoutConfig, RankDirection};
use crate::ir::EdgeSpec;

use super::geometry::Point;
use super::types::{PositionedNode, RoutedEdge};

const SELF_LOOP_REACH: f32 = 18.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) enum EdgeSide {
    Left,
    Right,
    Top,
    Bottom,
}

/// Exit side of `from` and entry side of `to`, chosen by whichever of |Δx| and
/// |Δy| between centers dominates. Ties follow the rank direction.
pub(super) fn edge_sides(
    from: &PositionedNode,
    to: &PositionedNode,
    direction: RankDirection,
) -> (EdgeSide, EdgeSide) {
    let a = from.center();
    let b = to.center();
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let use_horizontal = if dx.abs() == dy.abs() {
        direction == RankDirection::LeftRight
    } else {
        dx.abs() > dy.abs()
    };

    if use_horizontal {
        if dx >= 0.0 {
            (EdgeSide::Right, EdgeSide::Left)
        } else {
            (EdgeSide::Left, EdgeSide::Right)
        }
    } else if dy >= 0.0 {
        (EdgeSide::Bottom, EdgeSide::Top)
    } else {
        (EdgeSide::Top, EdgeSide::Bottom)
    }
}

/// Midpoint of `side`, shifted along the side by `offset` (clamped so the point
/// never leaves the side).
pub(super) fn anchor_point_for_node(node: &PositionedNode, side: EdgeSide, offset: f32) -> Point {
    let c = node.center();
    let max_offset = match side {
        EdgeSide::Left | EdgeSide::Right => node.h / 2.0 - 1.0,
        EdgeSide::Top | EdgeSide::Bottom => node.w / 2.0 - 1.0,
    };
    let offset = if max_offset > 0.0 {
        offset.clamp(-max_offset, max_offset)
    } else {
        0.0
    };
    match side {
        EdgeSide::Left => Point::new(node.x, c.y + offset),
        EdgeSide::Right => Point::new(node.x + node.w, c.y + offset),
        EdgeSide::Top => Point::new(c.x + offset, node.y),
        EdgeSide::Bottom => Point::new(c.x + offset, node.y + node.h),
    }
}

fn edge_pair_key(edge: &EdgeSpec) -> (&str, &str) {
    if edge.from <= edge.to {
        (edge.from.as_str(), edge.to.as_str())
    } else {
        (edge.to.as_str(), edge.from.as_str())
    }
}

/// Small rectangular loop hanging off the node's right side.
fn self_loop_points(node: &PositionedNode, nth: usize) -> Vec<Point> {
    let c = node.center();
    let reach = SELF_LOOP_REACH * (nth + 1) as f32;
    let spread = (node.h / 4.0).max(1.0);
    let right = node.x + node.w;
    vec![
        Point::new(right, c.y - spread),
        Point::new(right + reach, c.y - spread),
        Point::new(right + reach, c.y + spread),
        Point::new(right, c.y + spread),
    ]
}

/// Routes every edge against the current node positions. Deterministic in its
/// inputs; callers re-run it whenever nodes move.
pub fn route_edges(
    nodes: &[PositionedNode],
    edges: &[EdgeSpec],
    config: &LayoutConfig,
) -> Vec<RoutedEdge> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| (node.id.as_str(), idx))
        .collect();

    let mut pair_counts: HashMap<(&str, &str), usize> = HashMap::new();
    for edge in edges {
        *pair_counts.entry(edge_pair_key(edge)).or_insert(0) += 1;
    }
    let mut pair_seen: HashMap<(&str, &str), usize> = HashMap::new();

    let mut routed = Vec::with_capacity(edges.len());
    for edge in edges {
        let (Some(&from_idx), Some(&to_idx)) =
            (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
        else {
            tracing::warn!(from = edge.from.as_str(), to = edge.to.as_str(), "skipping edge with unknown endpoint");
            continue;
        };
        let key = edge_pair_key(edge);
        let seen = pair_seen.entry(key).or_insert(0);
        let nth = *seen;
        *seen += 1;

        let from = &nodes[from_idx];
        let to = &nodes[to_idx];
        let points = if from_idx == to_idx {
            self_loop_points(from, nth)
        } else {
            let total = pair_counts.get(&key).copied().unwrap_or(1) as f32;
            let offset = (nth as f32 - (total - 1.0) / 2.0) * config.edge_separation;
            let (start_side, end_side) = edge_sides(from, to, config.rank_direction);
            vec![
                anchor_point_for_node(from, start_side, offset),
                anchor_point_for_node(to, end_side, offset),
            ]
        };
        routed.push(RoutedEdge {
            from: edge.from.clone(),
            to: edge.to.clone(),
            label: edge.label.clone(),
            points,
        });
    }
    routed
}
