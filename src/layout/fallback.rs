use std::f32::consts::TAU;

use crate::config::LayoutConfig;
use crate::ir::DiagramType;

use super::geometry::Point;
use super::types::PositionedNode;

/// Closed-form placement for `archetype`. Node sizes are kept; only origins change.
pub(super) fn place_fallback(
    nodes: Vec<PositionedNode>,
    archetype: DiagramType,
    config: &LayoutConfig,
) -> Vec<PositionedNode> {
    match archetype {
        DiagramType::Flow | DiagramType::Tree => place_column(nodes, config),
        DiagramType::Timeline => place_axis(nodes, config),
        DiagramType::Cycle => place_ring(nodes, config),
        DiagramType::Matrix => place_grid(nodes, config),
    }
}

/// Top-to-bottom stack centered horizontally. Wraps into extra columns when a
/// single column would run past the bottom margin.
pub(super) fn place_column(mut nodes: Vec<PositionedNode>, config: &LayoutConfig) -> Vec<PositionedNode> {
    if nodes.is_empty() {
        return nodes;
    }
    let spacing = config.rank_separation;
    let row_height = nodes.iter().map(|n| n.h).fold(0.0f32, f32::max);
    let avail_h = config.usable_height().max(row_height);
    let per_column = (((avail_h + spacing) / (row_height + spacing)).floor() as usize).max(1);
    let columns = nodes.len().div_ceil(per_column);
    let column_width = nodes.iter().map(|n| n.w).fold(0.0f32, f32::max);
    let column_pitch = column_width + config.node_separation;
    let total_width = columns as f32 * column_pitch - config.node_separation;
    let first_center_x = config.width / 2.0 - total_width / 2.0 + column_width / 2.0;

    for (idx, node) in nodes.iter_mut().enumerate() {
        let column = idx / per_column;
        let row = idx % per_column;
        let cx = first_center_x + column as f32 * column_pitch;
        node.x = cx - node.w / 2.0;
        node.y = config.margin_y + row as f32 * (row_height + spacing) + (row_height - node.h) / 2.0;
    }
    nodes
}

/// Single row, centers evenly spaced across the usable width on the midline.
pub(super) fn place_axis(mut nodes: Vec<PositionedNode>, config: &LayoutConfig) -> Vec<PositionedNode> {
    let count = nodes.len();
    let (_, cy) = config.center();
    for (idx, node) in nodes.iter_mut().enumerate() {
        let cx = axis_center_x(idx, count, config);
        node.set_center(Point::new(cx, cy));
    }
    nodes
}

pub(super) fn axis_center_x(idx: usize, count: usize, config: &LayoutConfig) -> f32 {
    config.margin_x + config.usable_width() * (idx as f32 + 0.5) / count.max(1) as f32
}

/// Centers on a circle of radius `0.3 * min(width, height)`, angle `2π·i/n`.
pub(super) fn place_ring(mut nodes: Vec<PositionedNode>, config: &LayoutConfig) -> Vec<PositionedNode> {
    let count = nodes.len();
    for (idx, node) in nodes.iter_mut().enumerate() {
        node.set_center(ring_point(idx, count, config));
    }
    nodes
}

pub(super) fn ring_point(idx: usize, count: usize, config: &LayoutConfig) -> Point {
    let (cx, cy) = config.center();
    let radius = config.cycle_radius();
    let angle = TAU * idx as f32 / count.max(1) as f32;
    Point::new(cx + radius * angle.cos(), cy + radius * angle.sin())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct GridSpec {
    pub columns: usize,
    pub rows: usize,
    pub cell_w: f32,
    pub cell_h: f32,
    pub origin: Point,
}

impl GridSpec {
    pub fn for_count(count: usize, config: &LayoutConfig) -> Self {
        let columns = ((count.max(1) as f32).sqrt().ceil() as usize).max(1);
        let rows = count.max(1).div_ceil(columns);
        Self {
            columns,
            rows,
            cell_w: config.usable_width() / columns as f32,
            cell_h: config.usable_height() / rows as f32,
            origin: Point::new(config.margin_x, config.margin_y),
        }
    }

    pub fn cell_center(&self, cell: usize) -> Point {
        let col = cell % self.columns;
        let row = cell / self.columns;
        Point::new(
            self.origin.x + (col as f32 + 0.5) * self.cell_w,
            self.origin.y + (row as f32 + 0.5) * self.cell_h,
        )
    }

    /// Cell index containing `point`, clamped to the grid.
    pub fn cell_of(&self, point: Point) -> usize {
        let col = if self.cell_w > 0.0 {
            ((point.x - self.origin.x) / self.cell_w).floor()
        } else {
            0.0
        };
        let row = if self.cell_h > 0.0 {
            ((point.y - self.origin.y) / self.cell_h).floor()
        } else {
            0.0
        };
        let col = (col.max(0.0) as usize).min(self.columns - 1);
        let row = (row.max(0.0) as usize).min(self.rows - 1);
        row * self.columns + col
    }

    pub fn cell_count(&self) -> usize {
        self.columns * self.rows
    }
}

/// Square grid with `ceil(sqrt(n))` columns, each node centered in its cell.
pub(super) fn place_grid(mut nodes: Vec<PositionedNode>, config: &LayoutConfig) -> Vec<PositionedNode> {
    let grid = GridSpec::for_count(nodes.len(), config);
    for (idx, node) in nodes.iter_mut().enumerate() {
        node.set_center(grid.cell_center(idx));
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::geometry::distance;

    fn boxes(count: usize) -> Vec<PositionedNode> {
        (0..count)
            .map(|idx| PositionedNode::boxed(format!("n{idx}"), 0.0, 0.0, 120.0, 60.0))
            .collect()
    }

    fn no_overlaps(nodes: &[PositionedNode]) -> bool {
        for (i, a) in nodes.iter().enumerate() {
            for b in &nodes[i + 1..] {
                if a.rect().overlaps(&b.rect()) {
                    return false;
                }
            }
        }
        true
    }

    #[test]
    fn every_strategy_handles_single_node() {
        let config = LayoutConfig::default();
        for kind in DiagramType::ALL {
            let placed = place_fallback(boxes(1), kind, &config);
            assert_eq!(placed.len(), 1);
            let node = &placed[0];
            assert!(node.is_finite(), "{kind:?} produced non-finite position");
            assert!(node.x >= 0.0 && node.rect().right() <= config.width);
            assert!(node.y >= 0.0 && node.y + node.h <= config.height);
        }
    }

    #[test]
    fn column_stacks_top_to_bottom() {
        let config = LayoutConfig::default();
        let placed = place_column(boxes(4), &config);
        for pair in placed.windows(2) {
            assert!(pair[1].y > pair[0].y);
            assert_eq!(pair[1].x, pair[0].x);
        }
        assert!(no_overlaps(&placed));
    }

    #[test]
    fn column_wraps_when_too_tall() {
        let config = LayoutConfig::default();
        let placed = place_column(boxes(30), &config);
        assert!(no_overlaps(&placed));
        assert!(placed.iter().all(|n| n.y + n.h <= config.height - config.margin_y + 1e-3));
        let distinct_columns: std::collections::BTreeSet<i32> =
            placed.iter().map(|n| n.x.round() as i32).collect();
        assert!(distinct_columns.len() > 1);
    }

    #[test]
    fn axis_shares_vertical_center() {
        let config = LayoutConfig::default();
        let placed = place_axis(boxes(5), &config);
        let cy = placed[0].center().y;
        assert!(placed.iter().all(|n| (n.center().y - cy).abs() < 1e-3));
        assert!(placed.windows(2).all(|w| w[1].x > w[0].x));
    }

    #[test]
    fn ring_places_centers_on_radius() {
        let config = LayoutConfig::default();
        let (cx, cy) = config.center();
        let placed = place_ring(boxes(8), &config);
        for node in &placed {
            let r = distance(node.center(), Point::new(cx, cy));
            assert!((r - config.cycle_radius()).abs() < 1e-2);
        }
    }

    #[test]
    fn grid_uses_ceil_sqrt_columns() {
        let config = LayoutConfig::default();
        let grid = GridSpec::for_count(10, &config);
        assert_eq!(grid.columns, 4);
        assert_eq!(grid.rows, 3);
        let placed = place_grid(boxes(10), &config);
        assert!(no_overlaps(&placed));
        assert_eq!(grid.cell_of(placed[5].center()), 5);
    }
}
