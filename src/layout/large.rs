use std::collections::{HashMap, VecDeque};

use crate::ir::EdgeSpec;

use super::StageContext;
use super::aesthetic::optimize;
use super::fallback::place_fallback;
use super::geometry::Point;
use super::overlap::{OverlapReport, resolve_overlaps};
use super::ranking::tree_by_rank_order;
use super::types::PositionedNode;

/// A group of member indices laid out as a compact grid, moved as one box.
#[derive(Debug, Clone)]
struct Cluster {
    members: Vec<usize>,
    /// Member top-left offsets relative to the cluster's top-left.
    offsets: Vec<Point>,
    width: f32,
    height: f32,
}

fn index_pairs(nodes: &[PositionedNode], edges: &[EdgeSpec]) -> Vec<(usize, usize)> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| (node.id.as_str(), idx))
        .collect();
    edges
        .iter()
        .filter_map(|edge| {
            let from = *index.get(edge.from.as_str())?;
            let to = *index.get(edge.to.as_str())?;
            (from != to).then_some((from, to))
        })
        .collect()
}

/// Weakly connected components, each listed in ascending index order;
/// components ordered by their smallest member.
pub(super) fn weak_components(count: usize, edges: &[(usize, usize)]) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); count];
    for &(a, b) in edges {
        adjacency[a].push(b);
        adjacency[b].push(a);
    }
    let mut seen = vec![false; count];
    let mut components = Vec::new();
    for start in 0..count {
        if seen[start] {
            continue;
        }
        seen[start] = true;
        let mut queue = VecDeque::from([start]);
        let mut members = Vec::new();
        while let Some(idx) = queue.pop_front() {
            members.push(idx);
            for &next in &adjacency[idx] {
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
        members.sort_unstable();
        components.push(members);
    }
    components
}

fn compact_grid(members: Vec<usize>, nodes: &[PositionedNode], gap_x: f32, gap_y: f32) -> Cluster {
    let count = members.len().max(1);
    let columns = ((count as f32).sqrt().ceil() as usize).max(1);
    let rows = count.div_ceil(columns);
    let cell_w = members.iter().map(|&i| nodes[i].w).fold(0.0f32, f32::max);
    let cell_h = members.iter().map(|&i| nodes[i].h).fold(0.0f32, f32::max);

    let offsets = members
        .iter()
        .enumerate()
        .map(|(slot, &idx)| {
            let col = (slot % columns) as f32;
            let row = (slot / columns) as f32;
            Point::new(
                col * (cell_w + gap_x) + (cell_w - nodes[idx].w) / 2.0,
                row * (cell_h + gap_y) + (cell_h - nodes[idx].h) / 2.0,
            )
        })
        .collect();
    Cluster {
        members,
        offsets,
        width: columns as f32 * (cell_w + gap_x) - gap_x,
        height: rows as f32 * (cell_h + gap_y) - gap_y,
    }
}

/// Coarse-to-fine placement for graphs above the large-graph threshold.
///
/// Members of each cluster never overlap each other and cluster boxes are
/// resolved against each other, so the returned nodes are overlap-free.
pub(super) fn large_graph_layout(
    mut nodes: Vec<PositionedNode>,
    edges: &[EdgeSpec],
    ctx: &mut StageContext<'_>,
) -> (Vec<PositionedNode>, OverlapReport) {
    let pairs = index_pairs(&nodes, edges);
    let rank_order = tree_by_rank_order(nodes.len(), &pairs);
    let mut position = vec![0usize; nodes.len()];
    for (slot, &idx) in rank_order.iter().enumerate() {
        position[idx] = slot;
    }

    let chunk = ctx.config.engine.cluster_size.max(1);
    let gap = ctx.config.separation.for_archetype(ctx.archetype);
    let mut clusters = Vec::new();
    for mut component in weak_components(nodes.len(), &pairs) {
        component.sort_by_key(|&idx| position[idx]);
        for members in component.chunks(chunk) {
            clusters.push(compact_grid(members.to_vec(), &nodes, gap, gap));
        }
    }
    tracing::debug!(
        nodes = nodes.len(),
        clusters = clusters.len(),
        archetype = ctx.archetype.as_str(),
        "large graph clustered"
    );

    let boxes: Vec<PositionedNode> = clusters
        .iter()
        .enumerate()
        .map(|(idx, cluster)| {
            PositionedNode::boxed(format!("cluster-{idx}"), 0.0, 0.0, cluster.width, cluster.height)
        })
        .collect();
    let boxes = place_fallback(boxes, ctx.archetype, &ctx.config.layout);
    let (mut boxes, mut report) = resolve_overlaps(boxes, ctx);
    if ctx.config.engine.aesthetics_enabled() {
        let polished = optimize(boxes, ctx.archetype, &ctx.config.layout);
        let (resolved, second) = resolve_overlaps(polished, ctx);
        report.merge(&second);
        boxes = resolved;
    }

    for (cluster, cluster_box) in clusters.iter().zip(&boxes) {
        for (&idx, offset) in cluster.members.iter().zip(&cluster.offsets) {
            nodes[idx].x = cluster_box.x + offset.x;
            nodes[idx].y = cluster_box.y + offset.y;
        }
    }
    (nodes, report)
}
