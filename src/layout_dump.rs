use crate::config::Config;
use crate::ir::LayoutRequest;
use crate::layout::LayoutResult;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Flat geometry snapshot of a run, meant for plotting and regression diffs.
#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub kind: String,
    pub canvas_width: f32,
    pub canvas_height: f32,
    pub success: bool,
    pub confidence: f32,
    pub overlaps: usize,
    pub crossings: usize,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub importance: f32,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub from: String,
    pub to: String,
    pub self_loop: bool,
    pub points: Vec<[f32; 2]>,
}

impl LayoutDump {
    pub fn from_result(result: &LayoutResult, request: &LayoutRequest, config: &Config) -> Self {
        let nodes = result
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: node.id.clone(),
                x: node.x,
                y: node.y,
                width: node.w,
                height: node.h,
                importance: node.importance(),
            })
            .collect();

        let edges = result
            .edges
            .iter()
            .map(|edge| EdgeDump {
                from: edge.from.clone(),
                to: edge.to.clone(),
                self_loop: edge.from == edge.to,
                points: edge.points.iter().map(|p| [p.x, p.y]).collect(),
            })
            .collect();

        LayoutDump {
            kind: request.diagram_type.as_str().to_string(),
            canvas_width: config.layout.width,
            canvas_height: config.layout.height,
            success: result.success,
            confidence: result.confidence,
            overlaps: result.metrics.overlap_count,
            crossings: result.metrics.crossing_count,
            nodes,
            edges,
        }
    }
}

pub fn write_layout_dump(
    path: &Path,
    result: &LayoutResult,
    request: &LayoutRequest,
    config: &Config,
) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_result(result, request, config);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
