use crate::image::{ImageTensor, TensorPreprocessor};
use crate::models::labels::LEAF_LABEL;
use crate::models::{ClassificationResult, ModelHandle, ModelStore, StageClassifier};
use crate::pipeline::{PipelineOutcome, PipelineState};
use crate::utils::error::LeafGuardError;
use crate::Result;
use image::DynamicImage;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};

/// Runs the leaf gate and, for leaves, the disease stage.
///
/// One submission is in flight at a time. All preprocessing and inference
/// runs on the executor passed at construction; the caller only awaits the
/// returned [`PendingOutcome`].
#[derive(Clone)]
pub struct InferenceOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<ModelStore>,
    preprocessor: TensorPreprocessor,
    leaf_stage: StageClassifier,
    disease_stage: StageClassifier,
    executor: Handle,
    state: watch::Sender<PipelineState>,
}

impl InferenceOrchestrator {
    pub fn new(store: Arc<ModelStore>, executor: Handle) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            inner: Arc::new(Inner {
                store,
                preprocessor: TensorPreprocessor::default(),
                leaf_stage: StageClassifier::leaf(),
                disease_stage: StageClassifier::disease(),
                executor,
                state,
            }),
        }
    }

    pub fn store(&self) -> &Arc<ModelStore> {
        &self.inner.store
    }

    pub fn state(&self) -> PipelineState {
        *self.inner.state.borrow()
    }

    /// Watch state transitions, e.g. to drive a busy indicator.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.inner.state.subscribe()
    }

    /// Start classifying `image`.
    ///
    /// Fails with [`LeafGuardError::Busy`] while a previous submission is
    /// still running; nothing is queued. Once accepted, the submission always
    /// produces exactly one outcome.
    pub fn submit(&self, image: DynamicImage) -> Result<PendingOutcome> {
        let mut current = PipelineState::Idle;
        let admitted = self.inner.state.send_if_modified(|state| {
            current = *state;
            if state.is_idle() {
                *state = PipelineState::Preprocessing;
                true
            } else {
                false
            }
        });
        if !admitted {
            tracing::debug!("Rejected submission while {}", current);
            return Err(LeafGuardError::Busy(current));
        }

        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        self.inner.executor.spawn(async move {
            let reset = ResetOnDrop(Arc::clone(&inner));
            let outcome = inner.run(image).await;
            drop(reset);
            // the receiver may be gone if the caller lost interest
            let _ = tx.send(outcome);
        });

        Ok(PendingOutcome { rx })
    }

    /// Submit and wait for the outcome.
    pub async fn classify(&self, image: DynamicImage) -> Result<PipelineOutcome> {
        Ok(self.submit(image)?.await)
    }
}

/// Puts the orchestrator back to Idle when a run ends, even by panic.
struct ResetOnDrop(Arc<Inner>);

impl Drop for ResetOnDrop {
    fn drop(&mut self) {
        self.0.state.send_replace(PipelineState::Idle);
    }
}

impl Inner {
    fn transition(&self, next: PipelineState) {
        self.state.send_replace(next);
        tracing::debug!("Pipeline state: {}", next);
    }

    async fn run(self: &Arc<Self>, image: DynamicImage) -> PipelineOutcome {
        let started = Instant::now();
        let outcome = match self.execute(image).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Classification failed: {}", e);
                PipelineOutcome::from(&e)
            }
        };
        self.transition(PipelineState::Done);

        tracing::info!(
            "Classification completed: outcome={}, total_time={:.3}s",
            outcome.headline(),
            started.elapsed().as_secs_f32()
        );

        outcome
    }

    async fn execute(self: &Arc<Self>, image: DynamicImage) -> Result<PipelineOutcome> {
        let preprocessor = self.preprocessor.clone();
        let tensor = self
            .blocking("preprocessing", move || preprocessor.to_tensor(&image))
            .await?;
        let tensor = Arc::new(tensor);

        self.transition(PipelineState::Stage1Running);
        let (leaf_model, disease_model) = self.acquire_models().await?;

        let leaf = self
            .run_stage(self.leaf_stage, leaf_model, Arc::clone(&tensor))
            .await?;
        if leaf.label != LEAF_LABEL {
            return Ok(PipelineOutcome::NotALeaf {
                confidence: leaf.confidence,
            });
        }

        self.transition(PipelineState::Stage2Running);
        let disease = self
            .run_stage(self.disease_stage, disease_model, tensor)
            .await?;

        Ok(PipelineOutcome::Disease {
            label: disease.label,
            confidence: disease.confidence,
        })
    }

    /// Both handles, with one reload attempt if either is missing.
    async fn acquire_models(&self) -> Result<(ModelHandle, ModelHandle)> {
        if let Some(handles) = self.store.handles() {
            return Ok(handles);
        }

        tracing::info!("Models not ready, attempting to load them");
        if let Err(e) = self.store.ensure_loaded().await {
            tracing::warn!("Model reload failed: {}", e);
        }

        self.store.handles().ok_or(LeafGuardError::ModelsUnavailable)
    }

    async fn run_stage(
        &self,
        stage: StageClassifier,
        model: ModelHandle,
        tensor: Arc<ImageTensor>,
    ) -> Result<ClassificationResult> {
        let started = Instant::now();
        let result = self
            .blocking("inference", move || stage.classify(&tensor, model.as_ref()))
            .await?;

        tracing::debug!(
            "{} stage finished in {:.3}s",
            stage.model(),
            started.elapsed().as_secs_f32()
        );

        Ok(result)
    }

    async fn blocking<F, T>(&self, what: &str, work: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.executor
            .spawn_blocking(work)
            .await
            .map_err(|e| LeafGuardError::Internal(format!("{} task aborted: {}", what, e)))?
    }
}

/// Outcome of an accepted submission.
///
/// Resolves to exactly one [`PipelineOutcome`]. Dropping it does not stop
/// the run; the outcome is then discarded.
#[derive(Debug)]
pub struct PendingOutcome {
    rx: oneshot::Receiver<PipelineOutcome>,
}

impl Future for PendingOutcome {
    type Output = PipelineOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                PipelineOutcome::failure("classification ended without an outcome")
            })
        })
    }
}
