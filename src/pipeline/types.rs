use crate::models::{recommendations_for, Recommendations};
use crate::utils::error::LeafGuardError;
use serde::Serialize;
use std::fmt;

/// Result of one submission, the only value handed to presenters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Stage 1 decided the image is not a leaf
    NotALeaf { confidence: f32 },
    /// Stage 2 disease class
    Disease { label: String, confidence: f32 },
    /// Any stage failed
    Failure { reason: String },
}

impl PipelineOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        PipelineOutcome::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, PipelineOutcome::Failure { .. })
    }

    /// Care tips and treatments, only for an actual disease reading.
    pub fn recommendations(&self) -> Option<&'static Recommendations> {
        match self {
            PipelineOutcome::Disease { label, .. } => recommendations_for(label),
            _ => None,
        }
    }

    pub fn has_recommendations(&self) -> bool {
        self.recommendations().is_some()
    }

    pub fn confidence(&self) -> Option<f32> {
        match self {
            PipelineOutcome::NotALeaf { confidence } => Some(*confidence),
            PipelineOutcome::Disease { confidence, .. } => Some(*confidence),
            PipelineOutcome::Failure { .. } => None,
        }
    }

    /// Headline shown to the user
    pub fn headline(&self) -> &str {
        match self {
            PipelineOutcome::NotALeaf { .. } => "Not a leaf",
            PipelineOutcome::Disease { label, .. } => label,
            PipelineOutcome::Failure { reason } => reason,
        }
    }
}

impl From<&LeafGuardError> for PipelineOutcome {
    fn from(err: &LeafGuardError) -> Self {
        PipelineOutcome::failure(err.to_string())
    }
}

impl fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.confidence() {
            Some(confidence) => write!(
                f,
                "Result: {}\nAccuracy: {:.2}%",
                self.headline(),
                confidence
            ),
            None => write!(f, "Classification failed: {}", self.headline()),
        }
    }
}

/// Orchestrator state for the current submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Preprocessing,
    Stage1Running,
    Stage2Running,
    Done,
}

impl PipelineState {
    pub fn is_idle(&self) -> bool {
        matches!(self, PipelineState::Idle)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Preprocessing => "preprocessing",
            PipelineState::Stage1Running => "running stage 1",
            PipelineState::Stage2Running => "running stage 2",
            PipelineState::Done => "done",
        };
        f.write_str(name)
    }
}
