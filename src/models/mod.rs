pub mod assets;
pub mod backend;
pub mod classifier;
pub mod labels;
pub mod recommendations;
pub mod store;

use serde::Serialize;
use std::fmt;

pub use assets::AssetCache;
pub use backend::{InferenceModel, ModelHandle, ModelLoader, OnnxModel, OnnxModelLoader};
pub use classifier::{argmax, softmax, ClassificationResult, StageClassifier};
pub use labels::{LabelSet, DISEASE_LABELS, LEAF_LABELS};
pub use recommendations::{recommendations_for, Recommendations};
pub use store::{LoadState, ModelStats, ModelStore};

/// The two models driven by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelId {
    /// Leaf / non-leaf gate
    Leaf,
    /// Tomato disease classes
    Disease,
}

impl ModelId {
    pub const ALL: [ModelId; 2] = [ModelId::Leaf, ModelId::Disease];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Leaf => "leaf",
            ModelId::Disease => "disease",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
