mod aesthetic;
mod error;
mod evaluate;
mod fallback;
pub mod geometry;
mod large;
mod layered;
mod overlap;
mod ranking;
mod routing;
mod text;
pub(crate) mod types;

pub use aesthetic::optimize;
pub use error::LayoutError;
pub use evaluate::{Evaluation, confidence, crossing_count, evaluate};
pub use geometry::{Point, Rect};
pub use overlap::{OverlapReport, count_overlaps, resolve_overlaps};
pub use routing::route_edges;
pub use types::*;

use std::collections::HashSet;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::Config;
use crate::ir::{DiagramType, EdgeSpec, LayoutRequest};

/// Wall-clock budget for one layout run, checked between overlap rounds.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(budget_ms: u64) -> Self {
        Self::starting_at(Instant::now(), budget_ms)
    }

    pub fn starting_at(start: Instant, budget_ms: u64) -> Self {
        Self {
            start,
            budget: Duration::from_millis(budget_ms),
        }
    }

    pub fn expired(&self) -> bool {
        self.start.elapsed() >= self.budget
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

/// Per-run state shared by the stages: configuration, archetype, deadline and
/// the tie-breaking RNG.
pub struct StageContext<'a> {
    pub config: &'a Config,
    pub archetype: DiagramType,
    pub deadline: Deadline,
    pub(crate) rng: StdRng,
}

impl<'a> StageContext<'a> {
    pub fn new(config: &'a Config, archetype: DiagramType) -> Self {
        Self::with_deadline(config, archetype, Deadline::new(config.engine.time_budget_ms))
    }

    fn with_deadline(config: &'a Config, archetype: DiagramType, deadline: Deadline) -> Self {
        let rng = match config.engine.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            archetype,
            deadline,
            rng,
        }
    }

    /// Region node boxes are kept inside: the canvas minus its margins.
    pub fn canvas_area(&self) -> Rect {
        let layout = &self.config.layout;
        Rect::new(
            layout.margin_x,
            layout.margin_y,
            layout.usable_width(),
            layout.usable_height(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    BasePlacement,
    FirstOverlapPass,
    AestheticOptimization,
    EdgeRouting,
    FinalOverlapPass,
    Evaluate,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::BasePlacement => "base placement",
            Self::FirstOverlapPass => "first overlap pass",
            Self::AestheticOptimization => "aesthetic optimization",
            Self::EdgeRouting => "edge routing",
            Self::FinalOverlapPass => "final overlap pass",
            Self::Evaluate => "evaluate",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry point used by callers that keep a configuration across runs.
///
/// `layout` never panics and never returns an error: every failure comes back
/// as a `LayoutResult` with `success: false`.
#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    config: Config,
}

impl LayoutEngine {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub fn layout(&self, request: &LayoutRequest) -> LayoutResult {
        compute_layout(request, &self.config)
    }
}

pub fn compute_layout(request: &LayoutRequest, config: &Config) -> LayoutResult {
    let started = Instant::now();
    let mut stage = Stage::Start;
    guarded(started, &mut stage, |stage| {
        run_pipeline(request, config, started, stage)
    })
}

/// Runs `pipeline` behind a panic boundary. Errors and panics both end in
/// `Stage::Failed` and a `success: false` result naming the stage they hit.
fn guarded<F>(started: Instant, stage: &mut Stage, pipeline: F) -> LayoutResult
where
    F: FnOnce(&mut Stage) -> Result<LayoutResult, LayoutError>,
{
    let outcome = catch_unwind(AssertUnwindSafe(|| pipeline(&mut *stage)));
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    let err = match outcome {
        Ok(Ok(result)) => return result,
        Ok(Err(err)) => err,
        Err(payload) => LayoutError::Internal {
            stage: stage.as_str(),
            message: panic_message(payload.as_ref()),
        },
    };
    tracing::warn!(
        stage = stage.as_str(),
        error = %err,
        input_error = err.is_input_error(),
        "layout failed"
    );
    advance(stage, Stage::Failed);
    LayoutResult::failed(err.to_string(), elapsed_ms)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic with non-string payload".to_string())
}

fn advance(stage: &mut Stage, next: Stage) {
    tracing::debug!(from = stage.as_str(), to = next.as_str(), "stage");
    *stage = next;
}

/// Rejects requests the pipeline cannot lay out.
pub fn validate_request(request: &LayoutRequest, config: &Config) -> Result<(), LayoutError> {
    config.layout.validate()?;
    if request.nodes.is_empty() {
        return Err(LayoutError::EmptyGraph);
    }

    let mut ids: HashSet<&str> = HashSet::with_capacity(request.nodes.len());
    for node in &request.nodes {
        if !ids.insert(node.id.as_str()) {
            return Err(LayoutError::DuplicateNode(node.id.clone()));
        }
        let importance = node.metadata.as_ref().and_then(|meta| meta.importance);
        if importance.is_some_and(|value| !value.is_finite()) {
            return Err(LayoutError::InvalidImportance { id: node.id.clone() });
        }
    }

    for (idx, edge) in request.edges.iter().enumerate() {
        for id in [&edge.from, &edge.to] {
            if !ids.contains(id.as_str()) {
                return Err(LayoutError::UnknownNode {
                    edge: idx,
                    id: id.clone(),
                });
            }
        }
        if config.engine.reject_self_loops && edge.is_self_loop() {
            return Err(LayoutError::SelfLoop {
                edge: idx,
                id: edge.from.clone(),
            });
        }
    }
    Ok(())
}

fn initial_nodes(request: &LayoutRequest, config: &Config) -> Vec<PositionedNode> {
    request
        .nodes
        .iter()
        .map(|spec| {
            let (w, h) = text::node_size_for_label(&spec.label, &config.layout, &config.engine);
            PositionedNode::from_spec(spec, w, h)
        })
        .collect()
}

/// Layered pass for hierarchical archetypes, closed-form fallback otherwise
/// (or when the layered pass fails).
fn base_placement(
    nodes: Vec<PositionedNode>,
    edges: &[EdgeSpec],
    ctx: &StageContext<'_>,
) -> (Vec<PositionedNode>, bool) {
    let config = ctx.config;
    if config.engine.use_layered && ctx.archetype.is_hierarchical() {
        match layered::layered_layout(nodes.clone(), edges, &config.layout) {
            Ok(placed) => return (placed, true),
            Err(err) => tracing::warn!(error = %err, "layered layout failed, using fallback"),
        }
    }
    (
        fallback::place_fallback(nodes, ctx.archetype, &config.layout),
        false,
    )
}

fn run_pipeline(
    request: &LayoutRequest,
    config: &Config,
    started: Instant,
    stage: &mut Stage,
) -> Result<LayoutResult, LayoutError> {
    validate_request(request, config)?;
    let archetype = request.diagram_type;
    let deadline = Deadline::starting_at(started, config.engine.time_budget_ms);
    let mut ctx = StageContext::with_deadline(config, archetype, deadline);
    let mut report = OverlapReport::default();
    let large_graph = request.nodes.len() > config.engine.large_graph_threshold;
    let mut used_layered = false;

    advance(stage, Stage::BasePlacement);
    let nodes = initial_nodes(request, config);
    let nodes = if large_graph {
        let (nodes, coarse) = large::large_graph_layout(nodes, &request.edges, &mut ctx);
        report.merge(&coarse);
        nodes
    } else {
        let (placed, layered) = base_placement(nodes, &request.edges, &ctx);
        used_layered = layered;

        advance(stage, Stage::FirstOverlapPass);
        let (nodes, first) = resolve_overlaps(placed, &mut ctx);
        report.merge(&first);

        if config.engine.aesthetics_enabled() {
            advance(stage, Stage::AestheticOptimization);
            optimize(nodes, archetype, &config.layout)
        } else {
            nodes
        }
    };

    advance(stage, Stage::EdgeRouting);
    let edges = route_edges(&nodes, &request.edges, &config.layout);
    let working = WorkingSet { nodes, edges };

    advance(stage, Stage::FinalOverlapPass);
    let working = final_overlap_pass(working, &request.edges, &mut ctx, &mut report);

    advance(stage, Stage::Evaluate);
    if let Some(node) = working.nodes.iter().find(|node| !node.is_finite()) {
        return Err(LayoutError::Internal {
            stage: Stage::Evaluate.as_str(),
            message: format!("node `{}` has a non-finite position", node.id),
        });
    }
    let elapsed_ms = ctx.deadline.elapsed_ms();
    let evaluation = evaluate(&working.nodes, &working.edges, elapsed_ms, config);
    let metrics = LayoutMetrics {
        overlap_count: evaluation.overlap_count,
        crossing_count: evaluation.crossing_count,
        emergency_relocations: report.emergency_relocations,
        used_layered,
        large_graph,
        compliance: evaluation.compliance,
    };
    tracing::info!(
        archetype = archetype.as_str(),
        nodes = working.nodes.len(),
        edges = working.edges.len(),
        overlaps = evaluation.overlap_count,
        crossings = evaluation.crossing_count,
        emergency = report.emergency_relocations,
        confidence = evaluation.confidence,
        compliance = evaluation.compliance.passed(),
        elapsed_ms,
        "layout finished"
    );
    advance(stage, Stage::Done);

    Ok(LayoutResult {
        nodes: working.nodes,
        edges: working.edges,
        bounds: evaluation.bounds,
        processing_time_ms: elapsed_ms,
        success: true,
        confidence: evaluation.confidence,
        error: None,
        metrics,
    })
}

/// Guarantee pass. Edges are re-attached only when a node actually moved.
fn final_overlap_pass(
    working: WorkingSet,
    edges: &[EdgeSpec],
    ctx: &mut StageContext<'_>,
    report: &mut OverlapReport,
) -> WorkingSet {
    let WorkingSet {
        nodes: before,
        edges: routed,
    } = working;
    let (nodes, last) = resolve_overlaps(before.clone(), ctx);
    report.merge(&last);
    if nodes == before {
        return WorkingSet {
            nodes,
            edges: routed,
        };
    }
    let edges = route_edges(&nodes, edges, &ctx.config.layout);
    WorkingSet { nodes, edges }
}
