pub mod extractors;
pub mod handlers;
pub mod middleware;

use crate::{
    models::{LoadState, ModelId, ModelStore, DISEASE_LABELS, LEAF_LABELS},
    pipeline::InferenceOrchestrator,
    utils::error::LeafGuardError,
    Config, Result,
};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub orchestrator: InferenceOrchestrator,
}

pub async fn serve(config: Config) -> Result<()> {
    let store = Arc::new(ModelStore::onnx(&config));
    let orchestrator = InferenceOrchestrator::new(Arc::clone(&store), Handle::current());

    // Warm both models up front; a failure here is retried on first use.
    tokio::spawn(async move {
        if let Err(e) = store.ensure_loaded().await {
            tracing::warn!("Model warm-up failed: {}", e);
        }
    });

    let app = create_app(AppState {
        config: config.clone(),
        orchestrator,
    });

    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        LeafGuardError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /classify        - JSON base64 upload");
    tracing::info!("  POST /classify/upload - Multipart file upload");
    tracing::info!("  GET  /health          - Model readiness");
    tracing::info!("  GET  /api/info        - Service information");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        LeafGuardError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| LeafGuardError::Internal(format!("Server failed: {}", e)))?;

    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    let max_request_size = state.config.server_config.max_request_size;
    let request_timeout = Duration::from_secs(state.config.server_config.request_timeout);

    Router::new()
        .route("/classify", post(handlers::classify_json_handler))
        .route("/classify/upload", post(handlers::classify_upload_handler))
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .layer(RequestBodyLimitLayer::new(max_request_size))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .with_state(state)
}

/// Health endpoint
async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store = state.orchestrator.store();
    let models: serde_json::Map<String, serde_json::Value> = ModelId::ALL
        .iter()
        .map(|model| (model.to_string(), json!(store.state(*model))))
        .collect();

    let status = if store.is_ready() {
        "healthy"
    } else if ModelId::ALL
        .iter()
        .any(|model| store.state(*model) == LoadState::Failed)
    {
        "degraded"
    } else {
        "loading"
    };

    Json(json!({
        "status": status,
        "models": models,
        "pipeline": state.orchestrator.state(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Service information endpoint
async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let onnx = &state.config.onnx_config;
    let labels: serde_json::Map<String, serde_json::Value> = [LEAF_LABELS, DISEASE_LABELS]
        .iter()
        .map(|set| (set.name().to_string(), json!(set.labels())))
        .collect();

    Json(json!({
        "service": "Leaf Guard",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "models": state.orchestrator.store().stats(),
        "labels": labels,
        "onnx": {
            "intra_threads": onnx.intra_threads,
            "optimization_level": onnx.optimization_level,
        },
        "input_size": crate::image::preprocessing::INPUT_SIZE,
        "dev_mode": state.config.dev_mode,
    }))
}
