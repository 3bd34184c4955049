use crate::config::OnnxConfig;
use crate::image::ImageTensor;
use crate::models::ModelId;
use crate::utils::error::LeafGuardError;
use crate::Result;
use ndarray::Axis;
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// A loaded, ready-to-run model.
///
/// Implementations must tolerate calls from several threads at once; the
/// pipeline only ever reads from a model after it is loaded.
pub trait InferenceModel: Send + Sync {
    /// Run one forward pass and return the raw score vector.
    fn forward(&self, input: &ImageTensor) -> Result<Vec<f32>>;
}

/// Shared handle to a loaded model
pub type ModelHandle = Arc<dyn InferenceModel>;

/// Turns a materialized model file into a [`ModelHandle`].
///
/// Called on the blocking pool, never on an async worker.
pub trait ModelLoader: Send + Sync {
    fn load(&self, model: ModelId, path: &Path) -> Result<ModelHandle>;
}

/// ONNX Runtime session wrapper.
pub struct OnnxModel {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OnnxModel {
    pub fn from_file(path: &Path, onnx_config: &OnnxConfig) -> Result<Self> {
        tracing::info!("Loading ONNX model from: {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(optimization_level(onnx_config))?
            .with_intra_threads(onnx_config.intra_threads)?
            .commit_from_file(path)?;

        let input_name = match session.inputs.first() {
            Some(input) => input.name.clone(),
            None => {
                return Err(LeafGuardError::Inference(format!(
                    "Model {} has no inputs",
                    path.display()
                )))
            }
        };

        let output_name = match session.outputs.first() {
            Some(output) => output.name.clone(),
            None => {
                return Err(LeafGuardError::Inference(format!(
                    "Model {} has no outputs",
                    path.display()
                )))
            }
        };

        for (i, output) in session.outputs.iter().enumerate() {
            tracing::debug!("Model output[{}]: '{}'", i, output.name);
        }
        tracing::info!(
            "Model ready: input='{}', output='{}'",
            input_name,
            output_name
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }
}

impl InferenceModel for OnnxModel {
    fn forward(&self, input: &ImageTensor) -> Result<Vec<f32>> {
        // NCHW with a batch of one
        let batched = input.view().to_owned().insert_axis(Axis(0));
        let input_tensor = Tensor::from_array(batched)?;

        let scores: Vec<f32> = {
            let mut session = self.session.lock();
            let outputs = session.run(inputs![self.input_name.as_str() => input_tensor])?;

            match outputs.get(&self.output_name) {
                Some(output) => output.try_extract_array::<f32>()?.iter().copied().collect(),
                None => {
                    let available: Vec<String> = outputs.keys().map(|s| s.to_string()).collect();
                    return Err(LeafGuardError::Inference(format!(
                        "Output '{}' not found. Available outputs: {:?}",
                        self.output_name, available
                    )));
                }
            }
        };

        Ok(scores)
    }
}

fn optimization_level(onnx_config: &OnnxConfig) -> GraphOptimizationLevel {
    if !onnx_config.enable_optimization {
        return GraphOptimizationLevel::Disable;
    }
    match onnx_config.optimization_level {
        i32::MIN..=0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}

/// Loads models through ONNX Runtime.
#[derive(Debug, Clone)]
pub struct OnnxModelLoader {
    onnx_config: OnnxConfig,
}

impl OnnxModelLoader {
    pub fn new(onnx_config: OnnxConfig) -> Self {
        Self { onnx_config }
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load(&self, model: ModelId, path: &Path) -> Result<ModelHandle> {
        tracing::debug!("Creating ONNX session for {} model", model);
        let onnx_model = OnnxModel::from_file(path, &self.onnx_config)?;
        Ok(Arc::new(onnx_model))
    }
}
