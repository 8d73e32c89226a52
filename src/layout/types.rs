use serde::{Deserialize, Serialize};

use crate::ir::{NodeMetadata, NodeSpec};

use super::geometry::{Point, Rect};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedNode {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NodeMetadata>,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl PositionedNode {
    pub fn from_spec(spec: &NodeSpec, w: f32, h: f32) -> Self {
        Self {
            id: spec.id.clone(),
            label: spec.label.clone(),
            metadata: spec.metadata.clone(),
            x: 0.0,
            y: 0.0,
            w,
            h,
        }
    }

    /// Bare box used by tests and by the coarse large-graph pass.
    pub fn boxed(id: impl Into<String>, x: f32, y: f32, w: f32, h: f32) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            metadata: None,
            x,
            y,
            w,
            h,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }

    pub fn center(&self) -> Point {
        self.rect().center()
    }

    pub fn set_center(&mut self, center: Point) {
        self.x = center.x - self.w / 2.0;
        self.y = center.y - self.h / 2.0;
    }

    pub fn importance(&self) -> f32 {
        self.metadata
            .as_ref()
            .and_then(|meta| meta.importance)
            .filter(|value| value.is_finite())
            .map(|value| value.clamp(0.0, 1.0))
            .unwrap_or(0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.w.is_finite() && self.h.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedEdge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            min_x: rect.x,
            min_y: rect.y,
            max_x: rect.right(),
            max_y: rect.bottom(),
            width: rect.w,
            height: rect.h,
        }
    }
}

/// Pass/fail flags reported for telemetry only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compliance {
    pub zero_overlap: bool,
    pub within_time_budget: bool,
    pub has_structure: bool,
    pub within_canvas_bounds: bool,
}

impl Compliance {
    pub fn passed(&self) -> usize {
        [
            self.zero_overlap,
            self.within_time_budget,
            self.has_structure,
            self.within_canvas_bounds,
        ]
        .iter()
        .filter(|flag| **flag)
        .count()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutMetrics {
    pub overlap_count: usize,
    pub crossing_count: usize,
    pub emergency_relocations: usize,
    pub used_layered: bool,
    pub large_graph: bool,
    pub compliance: Compliance,
}

/// The sole artifact handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResult {
    pub nodes: Vec<PositionedNode>,
    pub edges: Vec<RoutedEdge>,
    pub bounds: Bounds,
    pub processing_time_ms: f64,
    pub success: bool,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metrics: LayoutMetrics,
}

impl LayoutResult {
    pub fn failed(error: String, processing_time_ms: f64) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            bounds: Bounds::default(),
            processing_time_ms,
            success: false,
            confidence: 0.0,
            error: Some(error),
            metrics: LayoutMetrics::default(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

/// Node/edge snapshot threaded by value through the pipeline stages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkingSet {
    pub nodes: Vec<PositionedNode>,
    pub edges: Vec<RoutedEdge>,
}
