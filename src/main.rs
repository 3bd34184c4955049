use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use leaf_guard::{
    config::Config, image::ImageLoader, pipeline::InferenceOrchestrator, web::serve, ModelStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "leaf-guard")]
#[command(about = "Two-stage tomato leaf disease classifier")]
struct Args {
    /// Directory holding the packaged model assets
    #[arg(long, default_value = "models", global = true)]
    assets_dir: String,

    /// Private writable directory for materialized models
    #[arg(long, default_value = "cache", global = true)]
    cache_dir: String,

    /// Number of worker threads
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// ONNX graph optimization level (0-3)
    #[arg(long, global = true)]
    optimization_level: Option<i32>,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Enable development mode
    #[arg(long, global = true)]
    dev: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Server bind address
        #[arg(long, default_value = "0.0.0.0:5005")]
        bind: String,
    },
    /// Classify image files and print the results
    Classify {
        /// Images to classify, processed one at a time
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    let bind = match &args.command {
        Command::Serve { bind } => bind.clone(),
        Command::Classify { .. } => String::new(),
    };
    let mut config = Config::new(bind, args.assets_dir, args.cache_dir, args.workers, args.dev)?;
    if let Some(level) = args.optimization_level {
        config = config.with_optimization_level(level)?;
    }

    tracing::info!("Assets directory: {}", config.assets_dir.display());
    tracing::info!("Cache directory: {}", config.cache_dir.display());
    if config.dev_mode {
        tracing::info!(
            "Development mode enabled, request timeout {}s",
            config.server_config.request_timeout
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    match args.command {
        Command::Serve { .. } => {
            tracing::info!("Starting leaf-guard service...");
            runtime.block_on(serve(config))?;
            Ok(())
        }
        Command::Classify { images } => runtime.block_on(classify_files(config, images)),
    }
}

async fn classify_files(config: Config, images: Vec<PathBuf>) -> Result<()> {
    let store = Arc::new(ModelStore::onnx(&config));
    let orchestrator = InferenceOrchestrator::new(store, tokio::runtime::Handle::current());

    let mut failures = 0usize;
    for path in &images {
        let outcome = match ImageLoader::from_path(path) {
            Ok(image) => orchestrator.classify(image).await?,
            Err(e) => {
                tracing::error!("Could not read {}: {}", path.display(), e);
                failures += 1;
                continue;
            }
        };

        if outcome.is_failure() {
            failures += 1;
        }
        println!("{}\n{}\n", path.display(), outcome);
        if let Some(recommendations) = outcome.recommendations() {
            println!("{}", recommendations);
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} images could not be classified", failures, images.len());
    }
    Ok(())
}
