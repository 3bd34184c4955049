use crate::image::ImageTensor;
use crate::models::{InferenceModel, LabelSet, ModelId, DISEASE_LABELS, LEAF_LABELS};
use crate::utils::error::LeafGuardError;
use crate::Result;
use serde::Serialize;

/// Top class of a single stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub index: usize,
    pub label: String,
    /// Percentage in [0, 100]
    pub confidence: f32,
}

/// Numerically stable softmax: `exp(x_i - max) / sum(exp(x_j - max))`.
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f64> = scores.iter().map(|&x| ((x - max) as f64).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|&e| (e / sum) as f32).collect()
}

/// Index of the largest value; the lowest index wins ties.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &value) in values.iter().enumerate() {
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((i, value)),
        }
    }
    best.map(|(i, _)| i)
}

/// One forward pass + softmax + argmax, bound to a model and its label set.
#[derive(Debug, Clone, Copy)]
pub struct StageClassifier {
    model: ModelId,
    labels: LabelSet,
}

impl StageClassifier {
    pub fn new(model: ModelId, labels: LabelSet) -> Self {
        Self { model, labels }
    }

    /// Stage 1: leaf / non-leaf
    pub fn leaf() -> Self {
        Self::new(ModelId::Leaf, LEAF_LABELS)
    }

    /// Stage 2: disease class
    pub fn disease() -> Self {
        Self::new(ModelId::Disease, DISEASE_LABELS)
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn classify(
        &self,
        tensor: &ImageTensor,
        model: &dyn InferenceModel,
    ) -> Result<ClassificationResult> {
        let scores = model.forward(tensor).map_err(|e| match e {
            LeafGuardError::Inference(_) => e,
            other => {
                LeafGuardError::Inference(format!("{} model forward pass: {}", self.model, other))
            }
        })?;

        self.interpret(&scores)
    }

    /// Turn raw scores into the top label and its confidence.
    pub fn interpret(&self, scores: &[f32]) -> Result<ClassificationResult> {
        if scores.len() != self.labels.len() {
            return Err(LeafGuardError::Inference(format!(
                "{} model returned {} scores for {} labels",
                self.model,
                scores.len(),
                self.labels.len()
            )));
        }
        if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
            return Err(LeafGuardError::Inference(format!(
                "{} model returned a non-finite score: {}",
                self.model, bad
            )));
        }

        let probabilities = softmax(scores);
        let index = argmax(&probabilities)
            .ok_or_else(|| LeafGuardError::Inference("empty score vector".to_string()))?;
        let label = self.labels.get(index).ok_or_else(|| {
            LeafGuardError::Inference(format!("label index {} out of range", index))
        })?;

        let result = ClassificationResult {
            index,
            label: label.to_string(),
            confidence: probabilities[index] * 100.0,
        };

        tracing::debug!(
            "{} stage: {} ({:.2}%) from scores {:?}",
            self.model,
            result.label,
            result.confidence,
            scores
        );

        Ok(result)
    }
}
