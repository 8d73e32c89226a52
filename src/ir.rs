use serde::{Deserialize, Serialize};

/// Declared diagram shape family. Selects fallback geometry and separation tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramType {
    Flow,
    Tree,
    Timeline,
    Cycle,
    Matrix,
}

impl DiagramType {
    pub const ALL: [DiagramType; 5] = [
        DiagramType::Flow,
        DiagramType::Tree,
        DiagramType::Timeline,
        DiagramType::Cycle,
        DiagramType::Matrix,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "flow" | "flowchart" => Some(Self::Flow),
            "tree" | "hierarchy" => Some(Self::Tree),
            "timeline" => Some(Self::Timeline),
            "cycle" => Some(Self::Cycle),
            "matrix" | "grid" => Some(Self::Matrix),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flow => "flow",
            Self::Tree => "tree",
            Self::Timeline => "timeline",
            Self::Cycle => "cycle",
            Self::Matrix => "matrix",
        }
    }

    /// Flow and tree diagrams are seeded by the layered pass; the others start
    /// from their closed-form placement.
    pub fn is_hierarchical(self) -> bool {
        matches!(self, Self::Flow | Self::Tree)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NodeMetadata>,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            metadata: None,
        }
    }

    pub fn with_importance(mut self, importance: f32) -> Self {
        self.metadata = Some(NodeMetadata {
            importance: Some(importance),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl EdgeSpec {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: None,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

/// Input contract handed over by the content-analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRequest {
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
    pub diagram_type: DiagramType,
}

impl LayoutRequest {
    pub fn new(diagram_type: DiagramType) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            diagram_type,
        }
    }

    pub fn node(&mut self, id: &str, label: &str) -> &mut Self {
        self.nodes.push(NodeSpec::new(id, label));
        self
    }

    pub fn edge(&mut self, from: &str, to: &str) -> &mut Self {
        self.edges.push(EdgeSpec::new(from, to));
        self
    }
}
