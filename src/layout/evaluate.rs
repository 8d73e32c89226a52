use crate::config::{Config, ScoringPolicy};

use super::geometry::{Rect, bounding_box, segments_cross};
use super::overlap::count_overlaps;
use super::types::{Bounds, Compliance, PositionedNode, RoutedEdge};

const BOUNDS_TOLERANCE: f32 = 1e-2;

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub overlap_count: usize,
    pub crossing_count: usize,
    pub bounds: Bounds,
    pub confidence: f32,
    pub compliance: Compliance,
}

/// Scores a finished drawing. Never changes it.
pub fn evaluate(
    nodes: &[PositionedNode],
    edges: &[RoutedEdge],
    elapsed_ms: f64,
    config: &Config,
) -> Evaluation {
    let overlap_count = count_overlaps(nodes);
    let crossing_count = crossing_count(edges);
    let bbox = bounding_box(nodes.iter().map(PositionedNode::rect));
    let bounds = bbox.map(Bounds::from_rect).unwrap_or_default();

    let canvas = Rect::new(0.0, 0.0, config.layout.width, config.layout.height);
    let within_canvas_bounds = bbox.is_none_or(|rect| canvas.contains_rect(&rect, BOUNDS_TOLERANCE));
    let compliance = Compliance {
        zero_overlap: overlap_count == 0,
        within_time_budget: elapsed_ms <= config.engine.time_budget_ms as f64,
        has_structure: !nodes.is_empty(),
        within_canvas_bounds,
    };
    let confidence = confidence(
        &config.scoring,
        overlap_count,
        elapsed_ms,
        nodes.len(),
        within_canvas_bounds,
    );

    Evaluation {
        overlap_count,
        crossing_count,
        bounds,
        confidence,
        compliance,
    }
}

pub fn confidence(
    policy: &ScoringPolicy,
    overlap_count: usize,
    elapsed_ms: f64,
    node_count: usize,
    within_canvas_bounds: bool,
) -> f32 {
    let mut score = policy.base;
    if overlap_count == 0 {
        score += policy.zero_overlap_bonus;
    } else {
        score -= policy.residual_overlap_penalty * overlap_count as f32;
    }
    if elapsed_ms < policy.fast_threshold_ms {
        score += policy.fast_bonus;
    } else if elapsed_ms > policy.slow_threshold_ms {
        score -= policy.slow_penalty;
    }
    if node_count > 0 {
        score += policy.non_empty_bonus;
    }
    if !within_canvas_bounds {
        score -= policy.out_of_bounds_penalty;
    }
    score.clamp(0.0, 1.0)
}

/// Pairs of edges whose polylines properly intersect. Edges sharing an
/// endpoint node are skipped since they always meet there.
pub fn crossing_count(edges: &[RoutedEdge]) -> usize {
    let mut count = 0;
    for (i, a) in edges.iter().enumerate() {
        for b in &edges[i + 1..] {
            if shares_endpoint(a, b) {
                continue;
            }
            if polylines_cross(a, b) {
                count += 1;
            }
        }
    }
    count
}

fn shares_endpoint(a: &RoutedEdge, b: &RoutedEdge) -> bool {
    a.from == b.from || a.from == b.to || a.to == b.from || a.to == b.to
}

fn polylines_cross(a: &RoutedEdge, b: &RoutedEdge) -> bool {
    a.points.windows(2).any(|seg_a| {
        b.points
            .windows(2)
            .any(|seg_b| segments_cross(seg_a[0], seg_a[1], seg_b[0], seg_b[1]))
    })
}
