use std::f32::consts::{FRAC_1_SQRT_2, TAU};

use rand::Rng;

use crate::ir::DiagramType;

use super::StageContext;
use super::geometry::{EPSILON, Point, Rect, distance, unit_vector};
use super::types::PositionedNode;

/// Angle between consecutive emergency candidates (golden angle).
const SPIRAL_STEP: f32 = 2.399_963;
/// Radius growth per emergency candidate, as a fraction of the pair's reach.
const SPIRAL_GROWTH: f32 = 0.25;
/// Smallest gap between neighbouring boxes in a shelf re-pack.
const SHELF_MIN_GAP: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverlapReport {
    pub rounds: usize,
    pub displaced_pairs: usize,
    /// Overlapping pairs left when the iterative phase stopped.
    pub residual_pairs: usize,
    pub emergency_relocations: usize,
    pub raster_placements: usize,
    /// Times the whole drawing was re-packed into shelves.
    pub repacks: usize,
    pub overflow_placements: usize,
    pub deadline_hit: bool,
}

impl OverlapReport {
    pub fn merge(&mut self, other: &OverlapReport) {
        self.rounds += other.rounds;
        self.displaced_pairs += other.displaced_pairs;
        self.residual_pairs += other.residual_pairs;
        self.emergency_relocations += other.emergency_relocations;
        self.raster_placements += other.raster_placements;
        self.repacks += other.repacks;
        self.overflow_placements += other.overflow_placements;
        self.deadline_hit |= other.deadline_hit;
    }
}

/// Displaces nodes until no two rectangles intersect.
///
/// Runs up to `max_overlap_iterations` repulsion rounds (or until the deadline
/// expires), then hands any remaining collisions to the emergency pass, which
/// always terminates with zero overlaps.
pub fn resolve_overlaps(
    mut nodes: Vec<PositionedNode>,
    ctx: &mut StageContext<'_>,
) -> (Vec<PositionedNode>, OverlapReport) {
    let mut report = OverlapReport::default();
    let area = ctx.canvas_area();
    for node in &mut nodes {
        clamp_node(node, &area);
    }
    if nodes.len() < 2 {
        return (nodes, report);
    }

    let max_iter = ctx.config.engine.max_overlap_iterations;
    for round in 0..max_iter {
        if ctx.deadline.expired() {
            report.deadline_hit = true;
            tracing::warn!(
                round,
                elapsed_ms = ctx.deadline.elapsed_ms(),
                "overlap resolution hit the time budget"
            );
            break;
        }
        let mut found = 0usize;
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                if !nodes[i].rect().overlaps(&nodes[j].rect()) {
                    continue;
                }
                found += 1;
                separate_pair(&mut nodes, i, j, ctx, &area);
            }
        }
        report.rounds = round + 1;
        report.displaced_pairs += found;
        if found == 0 {
            break;
        }
    }

    report.residual_pairs = count_overlaps(&nodes);
    if report.residual_pairs > 0 {
        tracing::warn!(
            pairs = report.residual_pairs,
            rounds = report.rounds,
            archetype = ctx.archetype.as_str(),
            "running emergency separation"
        );
        emergency_separation(&mut nodes, ctx, &area, &mut report);
    }
    tracing::debug!(
        rounds = report.rounds,
        displaced = report.displaced_pairs,
        emergency = report.emergency_relocations,
        "overlap pass finished"
    );
    (nodes, report)
}

pub fn count_overlaps(nodes: &[PositionedNode]) -> usize {
    let mut count = 0;
    for (i, a) in nodes.iter().enumerate() {
        let rect = a.rect();
        count += nodes[i + 1..]
            .iter()
            .filter(|b| rect.overlaps(&b.rect()))
            .count();
    }
    count
}

fn first_overlapping_pair(nodes: &[PositionedNode]) -> Option<(usize, usize)> {
    for i in 0..nodes.len() {
        let rect = nodes[i].rect();
        for j in (i + 1)..nodes.len() {
            if rect.overlaps(&nodes[j].rect()) {
                return Some((i, j));
            }
        }
    }
    None
}

pub(super) fn clamp_node(node: &mut PositionedNode, area: &Rect) {
    let (x, y) = Rect::clamp_origin(area, node.x, node.y, node.w, node.h);
    node.x = x;
    node.y = y;
}

/// Center distance along `dir` at which the two boxes stop intersecting with
/// `separation` to spare. A horizontal push needs `separation + (w1+w2)/2`.
pub(super) fn required_distance(dir: Point, a: &PositionedNode, b: &PositionedNode, separation: f32) -> f32 {
    let reach_x = (a.w + b.w) / 2.0 + separation;
    let reach_y = (a.h + b.h) / 2.0 + separation;
    let along_x = if dir.x.abs() > EPSILON {
        reach_x / dir.x.abs()
    } else {
        f32::INFINITY
    };
    let along_y = if dir.y.abs() > EPSILON {
        reach_y / dir.y.abs()
    } else {
        f32::INFINITY
    };
    along_x.min(along_y)
}

/// Direction used when two centers coincide.
pub(super) fn tie_break_direction<R: Rng>(archetype: DiagramType, rng: &mut R) -> Point {
    match archetype {
        DiagramType::Flow => Point::new(0.0, 1.0),
        DiagramType::Timeline => Point::new(1.0, 0.0),
        DiagramType::Tree => Point::new(FRAC_1_SQRT_2, FRAC_1_SQRT_2),
        DiagramType::Cycle | DiagramType::Matrix => {
            let angle: f32 = rng.gen_range(0.0..TAU);
            Point::new(angle.cos(), angle.sin())
        }
    }
}

fn separate_pair(
    nodes: &mut [PositionedNode],
    i: usize,
    j: usize,
    ctx: &mut StageContext<'_>,
    area: &Rect,
) {
    let a = nodes[i].center();
    let b = nodes[j].center();
    let separation = ctx.config.separation.between(
        ctx.archetype,
        nodes[i].importance(),
        nodes[j].importance(),
    );
    let dir = match unit_vector(a, b) {
        Some(dir) => dir,
        None => tie_break_direction(ctx.archetype, &mut ctx.rng),
    };
    let required = required_distance(dir, &nodes[i], &nodes[j], separation);
    let half = ((required - distance(a, b)).max(EPSILON)) / 2.0;

    nodes[i].x -= dir.x * half;
    nodes[i].y -= dir.y * half;
    nodes[j].x += dir.x * half;
    nodes[j].y += dir.y * half;
    clamp_node(&mut nodes[i], area);
    clamp_node(&mut nodes[j], area);
}

fn is_free(candidate: &Rect, nodes: &[PositionedNode], skip: usize) -> bool {
    nodes
        .iter()
        .enumerate()
        .all(|(idx, node)| idx == skip || !candidate.overlaps(&node.rect()))
}

/// Relocates the second node of every remaining overlapping pair. Each
/// relocation lands on a collision-free spot, so the number of overlapping
/// pairs strictly decreases and the pass ends with none.
///
/// When neither the spiral nor the raster scan finds room, the whole drawing is
/// re-packed into shelves inside the canvas. Nodes only leave the canvas when
/// that fails too.
fn emergency_separation(
    nodes: &mut [PositionedNode],
    ctx: &StageContext<'_>,
    area: &Rect,
    report: &mut OverlapReport,
) {
    let budget = count_overlaps(nodes);
    let mut repack_failed = false;
    for _ in 0..budget {
        let Some((anchor, mover)) = first_overlapping_pair(nodes) else {
            break;
        };
        let separation = ctx.config.separation.between(
            ctx.archetype,
            nodes[anchor].importance(),
            nodes[mover].importance(),
        );
        report.emergency_relocations += 1;

        if let Some((x, y)) = spiral_candidate(nodes, anchor, mover, separation, area, ctx) {
            nodes[mover].x = x;
            nodes[mover].y = y;
            continue;
        }
        if let Some((x, y)) = raster_candidate(nodes, mover, area) {
            report.raster_placements += 1;
            nodes[mover].x = x;
            nodes[mover].y = y;
            continue;
        }
        if !repack_failed {
            let gap = ctx.config.separation.for_archetype(ctx.archetype);
            if shelf_pack(nodes, area, gap) {
                report.repacks += 1;
                tracing::warn!(
                    nodes = nodes.len(),
                    archetype = ctx.archetype.as_str(),
                    "canvas space is fragmented, re-packed all nodes"
                );
                break;
            }
            repack_failed = true;
        }
        let (x, y) = overflow_position(nodes, mover, separation, area);
        report.overflow_placements += 1;
        tracing::warn!(
            node = nodes[mover].id.as_str(),
            x,
            y,
            "no free slot inside the canvas, placing node outside"
        );
        nodes[mover].x = x;
        nodes[mover].y = y;
    }
}

fn spiral_candidate(
    nodes: &[PositionedNode],
    anchor: usize,
    mover: usize,
    separation: f32,
    area: &Rect,
    ctx: &StageContext<'_>,
) -> Option<(f32, f32)> {
    let origin = nodes[anchor].center();
    let (w, h) = (nodes[mover].w, nodes[mover].h);
    let reach = ((nodes[anchor].w + w) / 2.0).max((nodes[anchor].h + h) / 2.0) + separation;
    for step in 1..=ctx.config.engine.emergency_candidates {
        let angle = step as f32 * SPIRAL_STEP;
        let radius = reach * (1.0 + SPIRAL_GROWTH * step as f32);
        let center = Point::new(origin.x + radius * angle.cos(), origin.y + radius * angle.sin());
        let candidate = Rect::from_center(center, w, h);
        let (x, y) = Rect::clamp_origin(area, candidate.x, candidate.y, w, h);
        if is_free(&Rect::new(x, y, w, h), nodes, mover) {
            return Some((x, y));
        }
    }
    None
}

/// Free canvas slot nearest to the node's current center, scanning at half-box
/// steps. The row and column flush with the far margin are always tried.
fn raster_candidate(nodes: &[PositionedNode], mover: usize, area: &Rect) -> Option<(f32, f32)> {
    let node = &nodes[mover];
    let current = node.center();
    let max_x = (area.right() - node.w).max(area.x);
    let max_y = (area.bottom() - node.h).max(area.y);
    let xs = raster_steps(area.x, max_x, node.w / 2.0);
    let ys = raster_steps(area.y, max_y, node.h / 2.0);

    let mut best: Option<(f32, f32, f32)> = None;
    for &y in &ys {
        for &x in &xs {
            let candidate = Rect::new(x, y, node.w, node.h);
            if !is_free(&candidate, nodes, mover) {
                continue;
            }
            let d = distance(candidate.center(), current);
            if best.is_none_or(|(_, _, best_d)| d < best_d) {
                best = Some((x, y, d));
            }
        }
    }
    best.map(|(x, y, _)| (x, y))
}

/// `start, start + step, ...` below `end`, then `end` itself.
fn raster_steps(start: f32, end: f32, step: f32) -> Vec<f32> {
    let step = step.max(1.0);
    let mut steps = Vec::new();
    let mut value = start;
    while value < end - EPSILON {
        steps.push(value);
        value += step;
    }
    steps.push(end);
    steps
}

/// Re-packs every node into row-major shelves centered in `area`, keeping the
/// current top-to-bottom, left-to-right reading order. Tries `gap` first and
/// tighter gaps after it. Leaves the nodes untouched and returns `false` when
/// even the tightest packing does not fit.
fn shelf_pack(nodes: &mut [PositionedNode], area: &Rect, gap: f32) -> bool {
    let mut order: Vec<usize> = (0..nodes.len()).collect();
    order.sort_by(|&a, &b| {
        let (ca, cb) = (nodes[a].center(), nodes[b].center());
        ca.y.total_cmp(&cb.y)
            .then_with(|| ca.x.total_cmp(&cb.x))
            .then_with(|| a.cmp(&b))
    });
    // The tightest gap stays positive so rounding never makes neighbours overlap.
    for gap in [gap, gap / 2.0, gap / 4.0, 0.0].map(|g| g.max(SHELF_MIN_GAP)) {
        if let Some(origins) = shelf_origins(nodes, &order, area, gap) {
            for (idx, x, y) in origins {
                nodes[idx].x = x;
                nodes[idx].y = y;
            }
            return true;
        }
    }
    false
}

fn shelf_origins(
    nodes: &[PositionedNode],
    order: &[usize],
    area: &Rect,
    gap: f32,
) -> Option<Vec<(usize, f32, f32)>> {
    let mut placed = Vec::with_capacity(order.len());
    let (mut cursor_x, mut shelf_y, mut shelf_h, mut used_w) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
    for &idx in order {
        let node = &nodes[idx];
        if node.w > area.w || node.h > area.h {
            return None;
        }
        if cursor_x > 0.0 && cursor_x + node.w > area.w {
            shelf_y += shelf_h + gap;
            cursor_x = 0.0;
            shelf_h = 0.0;
        }
        placed.push((idx, cursor_x, shelf_y));
        used_w = used_w.max(cursor_x + node.w);
        shelf_h = shelf_h.max(node.h);
        cursor_x += node.w + gap;
    }
    let used_h = shelf_y + shelf_h;
    if used_h > area.h {
        return None;
    }
    let offset_x = area.x + (area.w - used_w) / 2.0;
    let offset_y = area.y + (area.h - used_h) / 2.0;
    Some(
        placed
            .into_iter()
            .map(|(idx, x, y)| (idx, offset_x + x, offset_y + y))
            .collect(),
    )
}

/// Right of everything else: always collision-free, possibly off-canvas.
fn overflow_position(nodes: &[PositionedNode], mover: usize, separation: f32, area: &Rect) -> (f32, f32) {
    let max_right = nodes
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != mover)
        .map(|(_, node)| node.rect().right())
        .fold(area.x, f32::max);
    (max_right + separation, area.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn node(id: &str, x: f32, y: f32) -> PositionedNode {
        PositionedNode::boxed(id, x, y, 120.0, 60.0)
    }

    fn run(nodes: Vec<PositionedNode>, config: &Config, archetype: DiagramType) -> (Vec<PositionedNode>, OverlapReport) {
        let mut ctx = StageContext::new(config, archetype);
        resolve_overlaps(nodes, &mut ctx)
    }

    #[test]
    fn identical_positions_separate_for_every_archetype() {
        let config = Config::seeded(11);
        for kind in DiagramType::ALL {
            let nodes = vec![node("a", 400.0, 300.0), node("b", 400.0, 300.0)];
            let (out, _) = run(nodes, &config, kind);
            assert_eq!(count_overlaps(&out), 0, "{kind:?} left overlaps");
        }
    }

    #[test]
    fn identical_flow_pair_splits_vertically() {
        let config = Config::seeded(1);
        let nodes = vec![node("a", 400.0, 300.0), node("b", 400.0, 300.0)];
        let (out, report) = run(nodes, &config, DiagramType::Flow);
        assert_eq!(out[0].x, out[1].x);
        assert!(out[0].y < out[1].y);
        assert_eq!(report.emergency_relocations, 0);
    }

    #[test]
    fn identical_timeline_pair_splits_horizontally() {
        let config = Config::seeded(1);
        let nodes = vec![node("a", 400.0, 300.0), node("b", 400.0, 300.0)];
        let (out, _) = run(nodes, &config, DiagramType::Timeline);
        assert_eq!(out[0].y, out[1].y);
        assert!(out[0].x < out[1].x);
    }

    #[test]
    fn horizontal_push_uses_width_based_distance() {
        let config = Config::seeded(1);
        let nodes = vec![node("a", 400.0, 300.0), node("b", 450.0, 300.0)];
        let (out, _) = run(nodes, &config, DiagramType::Timeline);
        let gap = out[1].center().x - out[0].center().x;
        let expected = 120.0 + config.separation.timeline;
        assert!((gap - expected).abs() < 1e-2, "gap {gap} expected {expected}");
    }

    #[test]
    fn five_flow_nodes_with_shared_start_resolve() {
        let config = Config::seeded(5);
        let nodes = vec![
            node("a", 500.0, 100.0),
            node("b", 500.0, 300.0),
            node("c", 500.0, 300.0),
            node("d", 500.0, 500.0),
            node("e", 500.0, 700.0),
        ];
        let (out, _) = run(nodes, &config, DiagramType::Flow);
        assert_eq!(out.len(), 5);
        assert_eq!(count_overlaps(&out), 0);
    }

    #[test]
    fn dense_cluster_resolves_inside_budget() {
        let config = Config::seeded(42);
        let nodes: Vec<PositionedNode> = (0..40)
            .map(|idx| {
                let x = 100.0 + (idx * 37 % 280) as f32;
                let y = 100.0 + (idx * 53 % 240) as f32;
                node(&format!("n{idx}"), x, y)
            })
            .collect();
        let mut ctx = StageContext::new(&config, DiagramType::Matrix);
        let (out, _) = resolve_overlaps(nodes, &mut ctx);
        assert_eq!(count_overlaps(&out), 0);
        assert!(ctx.deadline.elapsed_ms() < config.engine.time_budget_ms as f64);
    }

    #[test]
    fn emergency_pass_runs_when_iterations_are_disabled() {
        let mut config = Config::seeded(3);
        config.engine.max_overlap_iterations = 0;
        let nodes = vec![node("a", 300.0, 300.0), node("b", 310.0, 310.0), node("c", 320.0, 300.0)];
        let (out, report) = run(nodes, &config, DiagramType::Cycle);
        assert_eq!(count_overlaps(&out), 0);
        assert!(report.emergency_relocations > 0);
        assert_eq!(report.rounds, 0);
    }

    #[test]
    fn overcrowded_canvas_overflows_without_overlap() {
        let mut config = Config::seeded(9);
        config.layout.width = 300.0;
        config.layout.height = 200.0;
        config.layout.margin_x = 10.0;
        config.layout.margin_y = 10.0;
        let nodes: Vec<PositionedNode> = (0..12).map(|idx| node(&format!("n{idx}"), 20.0, 20.0)).collect();
        let (out, report) = run(nodes, &config, DiagramType::Matrix);
        assert_eq!(count_overlaps(&out), 0);
        assert!(report.overflow_placements > 0);
    }

    fn tight_config(seed: u64) -> Config {
        let mut config = Config::seeded(seed);
        config.layout.width = 400.0;
        config.layout.height = 300.0;
        config.engine.emergency_candidates = 0;
        config.engine.max_overlap_iterations = 0;
        config
    }

    fn inside_area(nodes: &[PositionedNode], config: &Config) -> bool {
        let area = StageContext::new(config, DiagramType::Matrix).canvas_area();
        nodes.iter().all(|n| area.contains_rect(&n.rect(), 1e-2))
    }

    #[test]
    fn raster_scan_reaches_far_margin() {
        let config = tight_config(1);
        // usable area is (50, 50)..(350, 250); only the bottom row is free
        let nodes = vec![
            PositionedNode::boxed("top", 50.0, 50.0, 300.0, 70.0),
            PositionedNode::boxed("mid", 50.0, 120.0, 300.0, 70.0),
            node("c", 60.0, 60.0),
        ];
        let (out, report) = run(nodes, &config, DiagramType::Flow);
        assert_eq!(count_overlaps(&out), 0);
        assert_eq!(out[2].y, 190.0);
        assert_eq!(out[2].x, 50.0);
        assert_eq!(report.raster_placements, 1);
        assert_eq!(report.overflow_placements, 0);
    }

    #[test]
    fn fragmented_canvas_is_repacked_instead_of_overflowing() {
        let config = tight_config(2);
        // Two touching bands leave no free 120x60 slot, yet five boxes fit.
        let nodes = vec![
            node("a", 50.0, 80.0),
            node("b", 170.0, 80.0),
            node("c", 110.0, 170.0),
            node("d", 230.0, 170.0),
            node("e", 60.0, 90.0),
        ];
        let (out, report) = run(nodes, &config, DiagramType::Matrix);
        assert_eq!(count_overlaps(&out), 0);
        assert_eq!(report.raster_placements, 0);
        assert_eq!(report.repacks, 1);
        assert_eq!(report.overflow_placements, 0);
        assert!(inside_area(&out, &config));
        let ids: Vec<&str> = out.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn six_stacked_boxes_fit_a_tight_canvas() {
        let mut config = Config::seeded(8);
        config.layout.width = 400.0;
        config.layout.height = 300.0;
        for kind in DiagramType::ALL {
            let nodes: Vec<PositionedNode> = (0..6).map(|idx| node(&format!("n{idx}"), 140.0, 120.0)).collect();
            let (out, report) = run(nodes, &config, kind);
            assert_eq!(count_overlaps(&out), 0, "{kind:?}");
            assert_eq!(report.overflow_placements, 0, "{kind:?}");
            assert!(inside_area(&out, &config), "{kind:?}");
        }
    }

    #[test]
    fn raster_steps_end_on_the_far_edge() {
        assert_eq!(raster_steps(50.0, 190.0, 30.0), vec![50.0, 80.0, 110.0, 140.0, 170.0, 190.0]);
        assert_eq!(raster_steps(50.0, 170.0, 60.0), vec![50.0, 110.0, 170.0]);
        assert_eq!(raster_steps(50.0, 50.0, 60.0), vec![50.0]);
    }

    #[test]
    fn nodes_are_clamped_into_canvas() {
        let config = Config::seeded(2);
        let nodes = vec![node("a", -500.0, -500.0), node("b", 5000.0, 5000.0)];
        let (out, _) = run(nodes, &config, DiagramType::Flow);
        let layout = &config.layout;
        for n in &out {
            assert!(n.x >= layout.margin_x && n.y >= layout.margin_y);
            assert!(n.x + n.w <= layout.width - layout.margin_x + 1e-3);
            assert!(n.y + n.h <= layout.height - layout.margin_y + 1e-3);
        }
    }

    #[test]
    fn same_seed_gives_same_result() {
        let config = Config::seeded(77);
        let make = || (0..6).map(|idx| node(&format!("n{idx}"), 600.0, 400.0)).collect::<Vec<_>>();
        let (first, _) = run(make(), &config, DiagramType::Cycle);
        let (second, _) = run(make(), &config, DiagramType::Cycle);
        assert_eq!(first, second);
    }

    #[test]
    fn required_distance_picks_cheaper_axis() {
        let a = node("a", 0.0, 0.0);
        let b = node("b", 0.0, 0.0);
        assert_eq!(required_distance(Point::new(1.0, 0.0), &a, &b, 10.0), 130.0);
        assert_eq!(required_distance(Point::new(0.0, 1.0), &a, &b, 10.0), 70.0);
    }
}
