#![allow(dead_code)]

use leaf_guard::image::ImageTensor;
use leaf_guard::models::{AssetCache, InferenceModel, ModelHandle, ModelLoader};
use leaf_guard::{Config, LeafGuardError, ModelId};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Model returning fixed scores and counting forward passes.
pub struct ScriptedModel {
    scores: Vec<f32>,
    delay: Duration,
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(scores: &[f32]) -> Arc<Self> {
        Self::build(scores, Duration::ZERO, false)
    }

    pub fn slow(scores: &[f32], delay: Duration) -> Arc<Self> {
        Self::build(scores, delay, false)
    }

    pub fn failing() -> Arc<Self> {
        Self::build(&[], Duration::ZERO, true)
    }

    fn build(scores: &[f32], delay: Duration, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            scores: scores.to_vec(),
            delay,
            fail,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InferenceModel for ScriptedModel {
    fn forward(&self, input: &ImageTensor) -> leaf_guard::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(input.shape(), (3, 224, 224));
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail {
            return Err(LeafGuardError::Internal("native forward pass crashed".to_string()));
        }
        Ok(self.scores.clone())
    }
}

/// Loader handing out scripted models, with load counting and failure injection.
pub struct ScriptedLoader {
    leaf: Arc<ScriptedModel>,
    disease: Arc<ScriptedModel>,
    delay: Duration,
    fail: AtomicBool,
    leaf_loads: AtomicUsize,
    disease_loads: AtomicUsize,
    paths: Mutex<Vec<PathBuf>>,
}

impl ScriptedLoader {
    pub fn new(leaf: Arc<ScriptedModel>, disease: Arc<ScriptedModel>) -> Self {
        Self {
            leaf,
            disease,
            delay: Duration::ZERO,
            fail: AtomicBool::new(false),
            leaf_loads: AtomicUsize::new(0),
            disease_loads: AtomicUsize::new(0),
            paths: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn loads(&self, model: ModelId) -> usize {
        match model {
            ModelId::Leaf => self.leaf_loads.load(Ordering::SeqCst),
            ModelId::Disease => self.disease_loads.load(Ordering::SeqCst),
        }
    }

    pub fn loaded_paths(&self) -> Vec<PathBuf> {
        self.paths.lock().unwrap().clone()
    }
}

impl ModelLoader for ScriptedLoader {
    fn load(&self, model: ModelId, path: &Path) -> leaf_guard::Result<ModelHandle> {
        match model {
            ModelId::Leaf => self.leaf_loads.fetch_add(1, Ordering::SeqCst),
            ModelId::Disease => self.disease_loads.fetch_add(1, Ordering::SeqCst),
        };
        self.paths.lock().unwrap().push(path.to_path_buf());

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(LeafGuardError::Internal("corrupted model file".to_string()));
        }

        let handle = match model {
            ModelId::Leaf => self.leaf.clone() as ModelHandle,
            ModelId::Disease => self.disease.clone() as ModelHandle,
        };
        Ok(handle)
    }
}

/// Temp asset and cache dirs with both model assets present.
pub struct Fixture {
    pub dir: TempDir,
    pub config: Config,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("assets");
        let cache = dir.path().join("cache");
        fs::create_dir_all(&assets).unwrap();

        let config = Config::new(
            "127.0.0.1:0".to_string(),
            assets.to_string_lossy().into_owned(),
            cache.to_string_lossy().into_owned(),
            Some(2),
            false,
        )
        .unwrap();

        let fixture = Self { dir, config };
        for model in ModelId::ALL {
            fs::write(fixture.asset_path(model), b"serialized model").unwrap();
        }
        fixture
    }

    pub fn without_assets() -> Self {
        let fixture = Self::new();
        for model in ModelId::ALL {
            fs::remove_file(fixture.asset_path(model)).unwrap();
        }
        fixture
    }

    pub fn assets(&self) -> AssetCache {
        AssetCache::new(&self.config.assets_dir, &self.config.cache_dir)
    }

    fn asset_path(&self, model: ModelId) -> PathBuf {
        self.assets().asset_path(self.config.asset_name(model))
    }
}

pub fn leaf_image() -> image::DynamicImage {
    image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        64,
        64,
        image::Rgb([40, 160, 60]),
    ))
}
