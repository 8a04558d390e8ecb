use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::error::{ErrorKind, PredictionError};
use crate::handlers::PredictionHandler;
use crate::models::{ClassLabel, PredictionResponse};

/// Multipart field carrying the uploaded image.
const FILE_FIELD: &str = "file";

pub struct AppState {
    pub prediction_handler: Arc<PredictionHandler>,
}

#[derive(Debug, Serialize)]
struct ClassInfo {
    class_id: usize,
    class_name: ClassLabel,
}

pub fn create_router(prediction_handler: Arc<PredictionHandler>, max_upload_bytes: usize) -> Router {
    let state = Arc::new(AppState { prediction_handler });

    Router::new()
        .route("/", get(root_handler))
        .route("/predict", post(predict_handler))
        .route("/classes", get(classes_handler))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn predict_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>, PredictionError> {
    let image = read_upload(multipart).await?;
    let response = state.prediction_handler.handle_image(image).await?;
    Ok(Json(response))
}

/// Pull the image bytes out of the `file` part.
///
/// A `file` part without a filename attribute is a plain form field, not an upload.
async fn read_upload(multipart: Result<Multipart, MultipartRejection>) -> Result<Bytes, PredictionError> {
    let mut multipart = multipart.map_err(|e| {
        log::warn!("⚠️ Request is not a multipart upload: {}", e);
        PredictionError::NoFilePart
    })?;

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = match field.file_name() {
            None => continue,
            Some("") => return Err(PredictionError::NoSelectedFile),
            Some(name) => name.to_string(),
        };

        let data = field.bytes().await.map_err(upload_error)?;
        if data.is_empty() {
            return Err(PredictionError::NoSelectedFile);
        }

        log::debug!("📥 Received upload '{}' ({} bytes)", file_name, data.len());
        return Ok(data);
    }

    Err(PredictionError::NoFilePart)
}

/// Only an oversized body keeps its own answer; any other broken multipart
/// body carries no usable file part.
fn upload_error(e: MultipartError) -> PredictionError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        PredictionError::PayloadTooLarge(e)
    } else {
        log::warn!("⚠️ Malformed multipart body: {}", e);
        PredictionError::NoFilePart
    }
}

impl IntoResponse for PredictionError {
    fn into_response(self) -> Response {
        match self.kind() {
            ErrorKind::Input => {
                let status = match &self {
                    PredictionError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
                    _ => StatusCode::BAD_REQUEST,
                };
                log::warn!("⚠️ Rejected upload: {}", self);
                (status, Json(json!({ "error": self.to_string() }))).into_response()
            }
            ErrorKind::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
            ErrorKind::Internal => {
                log::error!("❌ Prediction failed: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Prediction failed", "details": self.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

async fn classes_handler() -> Json<Vec<ClassInfo>> {
    Json(
        ClassLabel::ALL
            .iter()
            .map(|label| ClassInfo {
                class_id: label.index(),
                class_name: *label,
            })
            .collect(),
    )
}

async fn root_handler() -> &'static str {
    "Vegetable Nutrition API - POST an image to /predict as multipart field 'file'"
}

async fn health_check() -> &'static str {
    "OK"
}
