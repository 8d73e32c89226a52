use std::cmp::Ordering;

use crate::config::LayoutConfig;
use crate::ir::DiagramType;

use super::fallback::{GridSpec, axis_center_x, ring_point};
use super::geometry::Point;
use super::types::PositionedNode;

/// Archetype-specific polish. Pure in the node array; never adds, drops or
/// reorders nodes. May reintroduce overlaps, which the final pass removes.
pub fn optimize(
    nodes: Vec<PositionedNode>,
    archetype: DiagramType,
    config: &LayoutConfig,
) -> Vec<PositionedNode> {
    if nodes.is_empty() {
        return nodes;
    }
    match archetype {
        DiagramType::Tree => center_tree_bands(nodes, config),
        DiagramType::Cycle => reproject_cycle(nodes, config),
        DiagramType::Timeline => align_timeline(nodes, config),
        DiagramType::Matrix => snap_matrix(nodes, config),
        DiagramType::Flow => nodes,
    }
}

/// Groups nodes into bands by center y and centers each band on the midline.
fn center_tree_bands(mut nodes: Vec<PositionedNode>, config: &LayoutConfig) -> Vec<PositionedNode> {
    let tolerance = (config.node_height + config.rank_separation) / 2.0;
    let mut order: Vec<usize> = (0..nodes.len()).collect();
    order.sort_by(|&a, &b| {
        nodes[a]
            .center()
            .y
            .partial_cmp(&nodes[b].center().y)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });

    let mut bands: Vec<Vec<usize>> = Vec::new();
    let mut band_top = f32::NEG_INFINITY;
    for idx in order {
        let cy = nodes[idx].center().y;
        match bands.last_mut() {
            Some(band) if cy - band_top <= tolerance => band.push(idx),
            _ => {
                band_top = cy;
                bands.push(vec![idx]);
            }
        }
    }

    let midline = config.width / 2.0;
    for band in bands {
        let lo = band.iter().map(|&i| nodes[i].x).fold(f32::INFINITY, f32::min);
        let hi = band
            .iter()
            .map(|&i| nodes[i].x + nodes[i].w)
            .fold(f32::NEG_INFINITY, f32::max);
        let shift = midline - (lo + hi) / 2.0;
        for idx in band {
            nodes[idx].x += shift;
        }
    }
    nodes
}

/// Puts every node back on the ring, overwriting earlier displacement.
fn reproject_cycle(mut nodes: Vec<PositionedNode>, config: &LayoutConfig) -> Vec<PositionedNode> {
    let count = nodes.len();
    for (idx, node) in nodes.iter_mut().enumerate() {
        node.set_center(ring_point(idx, count, config));
    }
    nodes
}

/// Keeps the current left-to-right order but forces equal spacing on one axis.
fn align_timeline(mut nodes: Vec<PositionedNode>, config: &LayoutConfig) -> Vec<PositionedNode> {
    let count = nodes.len();
    let mut order: Vec<usize> = (0..count).collect();
    order.sort_by(|&a, &b| {
        nodes[a]
            .center()
            .x
            .partial_cmp(&nodes[b].center().x)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });
    let (_, axis_y) = config.center();
    for (slot, idx) in order.into_iter().enumerate() {
        nodes[idx].set_center(Point::new(axis_center_x(slot, count, config), axis_y));
    }
    nodes
}

/// Snaps each node to its grid cell center; a taken cell sends the node to the
/// next free cell in row-major order.
fn snap_matrix(mut nodes: Vec<PositionedNode>, config: &LayoutConfig) -> Vec<PositionedNode> {
    let grid = GridSpec::for_count(nodes.len(), config);
    let cells = grid.cell_count();
    let mut taken = vec![false; cells];
    for node in nodes.iter_mut() {
        let preferred = grid.cell_of(node.center());
        let cell = (0..cells)
            .map(|offset| (preferred + offset) % cells)
            .find(|&cell| !taken[cell])
            .unwrap_or(preferred);
        taken[cell] = true;
        node.set_center(grid.cell_center(cell));
    }
    nodes
}
