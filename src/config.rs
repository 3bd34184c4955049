use crate::models::ModelId;
use anyhow::{bail, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,

    /// Packaged, read-only model assets
    pub assets_dir: PathBuf,

    /// Private writable directory holding materialized model copies
    pub cache_dir: PathBuf,

    /// Runtime worker threads
    pub workers: usize,

    /// Development mode
    pub dev_mode: bool,

    /// Model asset file names
    pub models: ModelAssets,

    /// ONNX Runtime settings
    pub onnx_config: OnnxConfig,

    /// HTTP server settings
    pub server_config: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct ModelAssets {
    pub leaf: String,
    pub disease: String,
}

impl Default for ModelAssets {
    fn default() -> Self {
        Self {
            leaf: "resnet18_leaf_nonleaf.onnx".to_string(),
            disease: "resnet18_tomato_disease.onnx".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// Intra-op CPU threads
    pub intra_threads: usize,

    /// Graph optimization level, 0-3
    pub optimization_level: i32,

    /// Enable graph optimization
    pub enable_optimization: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Request timeout in seconds
    pub request_timeout: u64,

    /// Maximum request body size in bytes
    pub max_request_size: usize,
}

impl Config {
    pub fn new(
        bind_addr: String,
        assets_dir: String,
        cache_dir: String,
        workers: Option<usize>,
        dev_mode: bool,
    ) -> Result<Self> {
        let cpu_cores = num_cpus::get();
        let workers = workers.unwrap_or(cpu_cores);
        if workers == 0 {
            bail!("worker count must be at least 1");
        }

        let onnx_config = OnnxConfig {
            intra_threads: (cpu_cores * 3 / 4).max(1),
            optimization_level: 3,
            enable_optimization: true,
        };

        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 },
            max_request_size: 50 * 1024 * 1024,
        };

        Ok(Self {
            bind_addr,
            assets_dir: PathBuf::from(assets_dir),
            cache_dir: PathBuf::from(cache_dir),
            workers,
            dev_mode,
            models: ModelAssets::default(),
            onnx_config,
            server_config,
        })
    }

    /// Override the ONNX graph optimization level.
    pub fn with_optimization_level(mut self, level: i32) -> Result<Self> {
        if !(0..=3).contains(&level) {
            bail!("optimization level must be between 0 and 3, got {}", level);
        }
        self.onnx_config.optimization_level = level;
        self.onnx_config.enable_optimization = level > 0;
        Ok(self)
    }

    /// Asset file name for a model
    pub fn asset_name(&self, model: ModelId) -> &str {
        match model {
            ModelId::Leaf => &self.models.leaf,
            ModelId::Disease => &self.models.disease,
        }
    }
}
