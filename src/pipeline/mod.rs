pub mod orchestrator;
pub mod types;

pub use orchestrator::{InferenceOrchestrator, PendingOutcome};
pub use types::{PipelineOutcome, PipelineState};
