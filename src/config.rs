use crate::ir::DiagramType;
use crate::layout::LayoutError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RankDirection {
    #[default]
    #[serde(rename = "TB", alias = "TD")]
    TopBottom,
    #[serde(rename = "LR")]
    LeftRight,
}

impl RankDirection {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "TD" | "TB" => Some(Self::TopBottom),
            "LR" => Some(Self::LeftRight),
            _ => None,
        }
    }
}

/// Canvas and spacing parameters for one layout run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    pub width: f32,
    pub height: f32,
    pub node_width: f32,
    pub node_height: f32,
    pub margin_x: f32,
    pub margin_y: f32,
    pub rank_direction: RankDirection,
    pub node_separation: f32,
    pub edge_separation: f32,
    pub rank_separation: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
            node_width: 120.0,
            node_height: 60.0,
            margin_x: 50.0,
            margin_y: 50.0,
            rank_direction: RankDirection::TopBottom,
            node_separation: 50.0,
            edge_separation: 10.0,
            rank_separation: 80.0,
        }
    }
}

impl LayoutConfig {
    pub fn usable_width(&self) -> f32 {
        (self.width - 2.0 * self.margin_x).max(0.0)
    }

    pub fn usable_height(&self) -> f32 {
        (self.height - 2.0 * self.margin_y).max(0.0)
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width / 2.0, self.height / 2.0)
    }

    /// Radius used by the cycle archetype.
    pub fn cycle_radius(&self) -> f32 {
        self.width.min(self.height) * 0.3
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        let fields = [
            ("width", self.width),
            ("height", self.height),
            ("nodeWidth", self.node_width),
            ("nodeHeight", self.node_height),
            ("marginX", self.margin_x),
            ("marginY", self.margin_y),
            ("nodeSeparation", self.node_separation),
            ("edgeSeparation", self.edge_separation),
            ("rankSeparation", self.rank_separation),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(LayoutError::InvalidConfig(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(LayoutError::InvalidConfig(
                "canvas width and height must be positive".to_string(),
            ));
        }
        if self.node_width <= 0.0 || self.node_height <= 0.0 {
            return Err(LayoutError::InvalidConfig(
                "default node size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Pipeline knobs that are not part of the drawing itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// 1 runs the base pipeline only, 2 and above enable the aesthetic optimizer.
    pub iteration_level: u8,
    pub max_overlap_iterations: usize,
    pub emergency_candidates: usize,
    pub time_budget_ms: u64,
    pub large_graph_threshold: usize,
    pub cluster_size: usize,
    /// Seed for tie-breaking nudges. `None` draws from OS entropy.
    pub seed: Option<u64>,
    pub use_layered: bool,
    pub reject_self_loops: bool,
    pub label_font_size: f32,
    pub label_padding: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            iteration_level: 2,
            max_overlap_iterations: 50,
            emergency_candidates: 20,
            time_budget_ms: 5000,
            large_graph_threshold: 60,
            cluster_size: 12,
            seed: None,
            use_layered: true,
            reject_self_loops: false,
            label_font_size: 14.0,
            label_padding: 24.0,
        }
    }
}

impl EngineConfig {
    pub fn aesthetics_enabled(&self) -> bool {
        self.iteration_level >= 2
    }
}

/// Minimum gap kept between node boxes, per archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SeparationConfig {
    pub flow: f32,
    pub tree: f32,
    pub timeline: f32,
    pub cycle: f32,
    pub matrix: f32,
    /// Extra separation factor applied at importance 1.0.
    pub importance_scale: f32,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            flow: 30.0,
            tree: 40.0,
            timeline: 20.0,
            cycle: 40.0,
            matrix: 20.0,
            importance_scale: 0.5,
        }
    }
}

impl SeparationConfig {
    pub fn for_archetype(&self, archetype: DiagramType) -> f32 {
        match archetype {
            DiagramType::Flow => self.flow,
            DiagramType::Tree => self.tree,
            DiagramType::Timeline => self.timeline,
            DiagramType::Cycle => self.cycle,
            DiagramType::Matrix => self.matrix,
        }
    }

    pub fn between(&self, archetype: DiagramType, importance_a: f32, importance_b: f32) -> f32 {
        let importance = importance_a.max(importance_b).clamp(0.0, 1.0);
        self.for_archetype(archetype) * (1.0 + self.importance_scale * importance)
    }
}

/// Additive weights behind the confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringPolicy {
    pub base: f32,
    pub zero_overlap_bonus: f32,
    pub residual_overlap_penalty: f32,
    pub fast_threshold_ms: f64,
    pub fast_bonus: f32,
    pub slow_threshold_ms: f64,
    pub slow_penalty: f32,
    pub non_empty_bonus: f32,
    pub out_of_bounds_penalty: f32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            base: 0.8,
            zero_overlap_bonus: 0.15,
            residual_overlap_penalty: 0.1,
            fast_threshold_ms: 2000.0,
            fast_bonus: 0.05,
            slow_threshold_ms: 5000.0,
            slow_penalty: 0.1,
            non_empty_bonus: 0.05,
            out_of_bounds_penalty: 0.1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub layout: LayoutConfig,
    pub engine: EngineConfig,
    pub separation: SeparationConfig,
    pub scoring: ScoringPolicy,
}

impl Config {
    /// Shorthand used by tests and benches: default config with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        let mut config = Self::default();
        config.engine.seed = Some(seed);
        config
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    layout: Option<LayoutConfig>,
    engine: Option<EngineConfig>,
    separation: Option<SeparationConfig>,
    scoring: Option<ScoringPolicy>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = serde_json::from_str(&contents)?;

    if let Some(layout) = parsed.layout {
        config.layout = layout;
    }
    if let Some(engine) = parsed.engine {
        config.engine = engine;
    }
    if let Some(separation) = parsed.separation {
        config.separation = separation;
    }
    if let Some(scoring) = parsed.scoring {
        config.scoring = scoring;
    }
    config.layout.validate()?;
    Ok(config)
}
