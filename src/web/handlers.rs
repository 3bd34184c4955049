use crate::{
    image::ImageLoader,
    models::Recommendations,
    pipeline::PipelineOutcome,
    utils::error::LeafGuardError,
    web::{
        extractors::{RequestId, ValidatedJson},
        AppState,
    },
    Result,
};
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    response::Json,
};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// JSON request body (base64 mode)
#[derive(Debug, Deserialize)]
pub struct ClassifyJsonRequest {
    /// Base64 encoded image, optionally as a data URL
    pub image: String,
}

/// Classification payload
#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub outcome: PipelineOutcome,
    pub summary: String,
    pub has_recommendations: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<&'static Recommendations>,
    pub processing_time_ms: u64,
}

/// JSON response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub timestamp: String,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, request_id: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
        }
    }
}

impl ApiResponse<ClassifyResponse> {
    /// A failure outcome still carries its payload, flagged unsuccessful.
    pub fn from_outcome(response: ClassifyResponse, request_id: String) -> Self {
        let error = match &response.outcome {
            PipelineOutcome::Failure { reason } => Some(ApiError {
                code: "CLASSIFICATION_FAILED".to_string(),
                message: reason.clone(),
            }),
            _ => None,
        };

        Self {
            success: error.is_none(),
            data: Some(response),
            error,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
        }
    }
}

/// Base64 JSON upload handler
pub async fn classify_json_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ValidatedJson(request): ValidatedJson<ClassifyJsonRequest>,
) -> Result<Json<ApiResponse<ClassifyResponse>>> {
    tracing::info!(
        "Processing JSON classify request: request_id={}, payload={} chars",
        request_id,
        request.image.len()
    );

    let image = decode_off_thread(move || ImageLoader::from_base64(&request.image)).await?;
    classify(&state, image, request_id).await
}

/// Multipart file upload handler
pub async fn classify_upload_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ClassifyResponse>>> {
    tracing::info!("Processing multipart classify request: request_id={}", request_id);

    let mut image_data: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        LeafGuardError::InvalidInput(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "file" => {
                if let Some(content_type) = field.content_type() {
                    if !content_type.starts_with("image/") {
                        return Err(LeafGuardError::UnsupportedFormat(content_type.to_string()));
                    }
                }

                let data = field.bytes().await.map_err(|e| {
                    LeafGuardError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;

                if data.is_empty() {
                    return Err(LeafGuardError::InvalidInput("Empty file".to_string()));
                }

                tracing::debug!("Received file: {} bytes", data.len());
                image_data = Some(data);
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let image_data = image_data
        .ok_or_else(|| LeafGuardError::InvalidInput("No image file provided".to_string()))?;

    let image = decode_off_thread(move || ImageLoader::from_bytes(&image_data)).await?;
    classify(&state, image, request_id).await
}

async fn decode_off_thread<F>(decode: F) -> Result<DynamicImage>
where
    F: FnOnce() -> Result<DynamicImage> + Send + 'static,
{
    tokio::task::spawn_blocking(decode)
        .await
        .map_err(|e| LeafGuardError::Internal(format!("image decode task aborted: {}", e)))?
}

async fn classify(
    state: &AppState,
    image: DynamicImage,
    request_id: String,
) -> Result<Json<ApiResponse<ClassifyResponse>>> {
    let start_time = Instant::now();

    let outcome = state.orchestrator.submit(image)?.await;
    let processing_time = start_time.elapsed();

    tracing::info!(
        "Classify completed: request_id={}, outcome={}, time={:.3}s",
        request_id,
        outcome.headline(),
        processing_time.as_secs_f32()
    );

    let response = ClassifyResponse {
        summary: outcome.to_string(),
        has_recommendations: outcome.has_recommendations(),
        recommendations: outcome.recommendations(),
        outcome,
        processing_time_ms: processing_time.as_millis() as u64,
    };

    Ok(Json(ApiResponse::from_outcome(response, request_id)))
}
