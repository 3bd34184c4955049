pub mod config;
pub mod image;
pub mod models;
pub mod pipeline;
pub mod utils;
pub mod web;

// Re-export the main types
pub use config::Config;
pub use models::{ModelId, ModelStore};
pub use pipeline::{InferenceOrchestrator, PipelineOutcome, PipelineState};
pub use utils::error::LeafGuardError;

pub type Result<T> = std::result::Result<T, LeafGuardError>;
