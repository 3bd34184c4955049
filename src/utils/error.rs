use crate::models::ModelId;
use crate::pipeline::PipelineState;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LeafGuardError {
    #[error("Image preprocessing failed: {0}")]
    Preprocess(String),

    #[error("Model '{model}' failed to load: {reason}")]
    ModelLoad { model: ModelId, reason: String },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("models unavailable")]
    ModelsUnavailable,

    #[error("Classifier busy: previous submission is {0}")]
    Busy(PipelineState),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LeafGuardError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LeafGuardError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LeafGuardError::Preprocess(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LeafGuardError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            LeafGuardError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            LeafGuardError::Base64(_) => StatusCode::BAD_REQUEST,
            LeafGuardError::Json(_) => StatusCode::BAD_REQUEST,
            LeafGuardError::ImageDecode(_) => StatusCode::BAD_REQUEST,
            LeafGuardError::Busy(_) => StatusCode::TOO_MANY_REQUESTS,
            LeafGuardError::ModelLoad { .. } => StatusCode::SERVICE_UNAVAILABLE,
            LeafGuardError::ModelsUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            LeafGuardError::Preprocess(_) => "PREPROCESS_ERROR",
            LeafGuardError::ModelLoad { .. } => "MODEL_LOAD_ERROR",
            LeafGuardError::Inference(_) => "INFERENCE_ERROR",
            LeafGuardError::ModelsUnavailable => "MODELS_UNAVAILABLE",
            LeafGuardError::Busy(_) => "CLASSIFIER_BUSY",
            LeafGuardError::InvalidInput(_) => "INVALID_INPUT",
            LeafGuardError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            LeafGuardError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            LeafGuardError::Config(_) => "CONFIG_ERROR",
            LeafGuardError::Io(_) => "IO_ERROR",
            LeafGuardError::Json(_) => "JSON_ERROR",
            LeafGuardError::Base64(_) => "BASE64_DECODE_ERROR",
            LeafGuardError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            LeafGuardError::Ort(_) => "ORT_ERROR",
            LeafGuardError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for LeafGuardError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        });

        if status.is_server_error() {
            tracing::error!("Request failed: {} ({})", self, status);
        } else {
            tracing::warn!("Request rejected: {} ({})", self, status);
        }

        (status, axum::Json(error_response)).into_response()
    }
}
