#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod ir;
pub mod layout;
pub mod layout_dump;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, load_config};
pub use ir::{DiagramType, EdgeSpec, LayoutRequest, NodeSpec};
pub use layout::{LayoutEngine, LayoutError, LayoutResult, compute_layout};
