use crate::config::Config;
use crate::models::{AssetCache, ModelHandle, ModelId, ModelLoader, OnnxModelLoader};
use crate::utils::error::LeafGuardError;
use crate::Result;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Load state of one model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadState::Unloaded => "unloaded",
            LoadState::Loading => "loading",
            LoadState::Ready => "ready",
            LoadState::Failed => "failed",
        };
        f.write_str(name)
    }
}

enum SlotState {
    Unloaded,
    Loading,
    Ready(ModelHandle),
    Failed(String),
}

/// `None` until the attempt finishes
type AttemptResult = Option<std::result::Result<(), String>>;

struct ModelSlot {
    id: ModelId,
    file_name: String,
    state: RwLock<SlotState>,
    // Some while an attempt runs; only the attempt task clears it
    in_flight: Mutex<Option<watch::Receiver<AttemptResult>>>,
}

impl ModelSlot {
    fn new(id: ModelId, file_name: String) -> Self {
        Self {
            id,
            file_name,
            state: RwLock::new(SlotState::Unloaded),
            in_flight: Mutex::new(None),
        }
    }

    fn load_state(&self) -> LoadState {
        match &*self.state.read() {
            SlotState::Unloaded => LoadState::Unloaded,
            SlotState::Loading => LoadState::Loading,
            SlotState::Ready(_) => LoadState::Ready,
            SlotState::Failed(_) => LoadState::Failed,
        }
    }

    fn handle(&self) -> Option<ModelHandle> {
        match &*self.state.read() {
            SlotState::Ready(handle) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    fn last_error(&self) -> Option<String> {
        match &*self.state.read() {
            SlotState::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    fn load_error(&self, reason: impl Into<String>) -> LeafGuardError {
        LeafGuardError::ModelLoad {
            model: self.id,
            reason: reason.into(),
        }
    }

    /// Record the end of the running attempt.
    fn finish(
        &self,
        loaded: std::result::Result<ModelHandle, String>,
        started: Instant,
    ) -> std::result::Result<(), String> {
        let mut in_flight = self.in_flight.lock();

        let result = match loaded {
            Ok(handle) => {
                *self.state.write() = SlotState::Ready(handle);
                tracing::info!(
                    "{} model ready in {:.3}s",
                    self.id,
                    started.elapsed().as_secs_f32()
                );
                Ok(())
            }
            Err(reason) => {
                tracing::warn!("Failed to load {} model: {}", self.id, reason);
                *self.state.write() = SlotState::Failed(reason.clone());
                Err(reason)
            }
        };

        *in_flight = None;
        result
    }
}

/// Owns the leaf and disease model handles.
///
/// Loading is lazy and at most one attempt per model runs at any time. The
/// attempt runs in its own task, so callers that give up waiting do not
/// abandon it; everyone waiting shares its result. A failed attempt can be
/// retried by a later call.
pub struct ModelStore {
    leaf: Arc<ModelSlot>,
    disease: Arc<ModelSlot>,
    assets: AssetCache,
    loader: Arc<dyn ModelLoader>,
    native_loads: AtomicU64,
}

impl ModelStore {
    pub fn new(config: &Config, loader: Arc<dyn ModelLoader>) -> Self {
        let slot = |model: ModelId| {
            Arc::new(ModelSlot::new(model, config.asset_name(model).to_string()))
        };

        Self {
            leaf: slot(ModelId::Leaf),
            disease: slot(ModelId::Disease),
            assets: AssetCache::new(&config.assets_dir, &config.cache_dir),
            loader,
            native_loads: AtomicU64::new(0),
        }
    }

    /// Store backed by ONNX Runtime sessions
    pub fn onnx(config: &Config) -> Self {
        Self::new(config, Arc::new(OnnxModelLoader::new(config.onnx_config.clone())))
    }

    fn slot(&self, model: ModelId) -> &Arc<ModelSlot> {
        match model {
            ModelId::Leaf => &self.leaf,
            ModelId::Disease => &self.disease,
        }
    }

    /// Load both models if needed. Both attempts run to completion even if
    /// one of them fails; the first failure is returned.
    pub async fn ensure_loaded(&self) -> Result<()> {
        let (leaf, disease) = tokio::join!(
            self.ensure_model_loaded(ModelId::Leaf),
            self.ensure_model_loaded(ModelId::Disease)
        );
        leaf?;
        disease?;
        Ok(())
    }

    /// Load a single model if it is not Ready yet, joining the running
    /// attempt if there is one.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn ensure_model_loaded(&self, model: ModelId) -> Result<()> {
        let slot = self.slot(model);

        let mut attempt = {
            let mut in_flight = slot.in_flight.lock();
            if slot.handle().is_some() {
                return Ok(());
            }
            match in_flight.as_ref() {
                Some(running) => running.clone(),
                None => {
                    let started = self.start_attempt(slot);
                    *in_flight = Some(started.clone());
                    started
                }
            }
        };

        let finished = attempt
            .wait_for(Option::is_some)
            .await
            .map(|result| (*result).clone());

        match finished {
            Ok(Some(Ok(()))) => Ok(()),
            Ok(Some(Err(reason))) => Err(slot.load_error(reason)),
            Ok(None) | Err(_) => Err(slot.load_error("load attempt ended without a result")),
        }
    }

    /// Spawn one load attempt. Caller holds the slot's `in_flight` lock.
    fn start_attempt(&self, slot: &Arc<ModelSlot>) -> watch::Receiver<AttemptResult> {
        let (done, attempt) = watch::channel(None);

        *slot.state.write() = SlotState::Loading;
        self.native_loads.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Loading {} model ({})", slot.id, slot.file_name);

        let slot = Arc::clone(slot);
        let assets = self.assets.clone();
        let loader = Arc::clone(&self.loader);

        tokio::spawn(async move {
            let started = Instant::now();
            let file_name = slot.file_name.clone();
            let model = slot.id;

            let joined = tokio::task::spawn_blocking(move || {
                let path = assets.materialize(&file_name)?;
                loader.load(model, &path)
            })
            .await;

            let loaded = match joined {
                Ok(Ok(handle)) => Ok(handle),
                Ok(Err(e)) => Err(e.to_string()),
                Err(e) => Err(format!("load task aborted: {}", e)),
            };

            let result = slot.finish(loaded, started);
            done.send_replace(Some(result));
        });

        attempt
    }

    /// Loaded handle, or `None` unless the model is Ready
    pub fn handle(&self, model: ModelId) -> Option<ModelHandle> {
        self.slot(model).handle()
    }

    /// Both handles, only when both models are Ready
    pub fn handles(&self) -> Option<(ModelHandle, ModelHandle)> {
        Some((self.handle(ModelId::Leaf)?, self.handle(ModelId::Disease)?))
    }

    pub fn state(&self, model: ModelId) -> LoadState {
        self.slot(model).load_state()
    }

    pub fn is_ready(&self) -> bool {
        ModelId::ALL
            .iter()
            .all(|model| self.state(*model) == LoadState::Ready)
    }

    /// Number of load attempts handed to the loader so far
    pub fn load_attempts(&self) -> u64 {
        self.native_loads.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> ModelStats {
        let entries = ModelId::ALL
            .iter()
            .map(|model| {
                let slot = self.slot(*model);
                ModelEntry {
                    model: *model,
                    state: slot.load_state(),
                    asset: slot.file_name.clone(),
                    cached_path: self.assets.cached_path(&slot.file_name),
                    materialized: self.assets.is_materialized(&slot.file_name),
                    last_error: slot.last_error(),
                }
            })
            .collect();

        ModelStats {
            ready: self.is_ready(),
            load_attempts: self.load_attempts(),
            models: entries,
        }
    }
}

/// Model store snapshot for health and info endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ModelStats {
    pub ready: bool,
    pub load_attempts: u64,
    pub models: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelEntry {
    pub model: ModelId,
    pub state: LoadState,
    pub asset: String,
    pub cached_path: PathBuf,
    pub materialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}
