use thiserror::Error;

/// Everything that can turn a layout run into a `success: false` result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("graph has no nodes")]
    EmptyGraph,
    #[error("edge {edge} references unknown node `{id}`")]
    UnknownNode { edge: usize, id: String },
    #[error("duplicate node id `{0}`")]
    DuplicateNode(String),
    #[error("edge {edge} is a self-loop on `{id}`")]
    SelfLoop { edge: usize, id: String },
    #[error("node `{id}` has non-finite importance")]
    InvalidImportance { id: String },
    #[error("invalid layout config: {0}")]
    InvalidConfig(String),
    #[error("layout failed during {stage}: {message}")]
    Internal { stage: &'static str, message: String },
}

impl LayoutError {
    pub fn is_input_error(&self) -> bool {
        !matches!(self, Self::Internal { .. })
    }
}
