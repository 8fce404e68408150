//! POST /predict
//!
//! Multipart image upload → top-3 pest predictions.

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{PredictionEntry, PredictionResponse},
    services::{classify_image, TOP_K},
    AppState,
};

/// Multipart field carrying the image
const FILE_FIELD: &str = "file";

pub async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<PredictionResponse>> {
    let request_id = Uuid::new_v4();

    // Fail fast before reading the upload
    if let Some(reason) = state.classifier.unavailable_reason() {
        warn!(%request_id, "Rejecting prediction: {}", reason);
        return Err(ApiError::ModelUnavailable(reason));
    }

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            let filename = field.file_name().map(str::to_string);
            let bytes = field.bytes().await.map_err(|e| {
                warn!(%request_id, "Failed to read upload: {}", e);
                ApiError::from(e)
            })?;
            upload = Some((filename, bytes));
            break;
        }
    }

    let (filename, bytes) = upload
        .ok_or_else(|| ApiError::BadRequest(format!("missing '{}' field", FILE_FIELD)))?;

    info!(%request_id, filename = ?filename, bytes = bytes.len(), "Classifying upload");

    let classifier = state.classifier.clone();
    let ranking = tokio::task::spawn_blocking(move || classify_image(&classifier, &bytes, TOP_K))
        .await
        .map_err(|e| ApiError::Internal(format!("classification task failed: {}", e)))?
        .map_err(|e| {
            warn!(%request_id, "Classification failed: {}", e);
            ApiError::from(e)
        })?;

    let predictions: Vec<PredictionEntry> = ranking.top.iter().map(PredictionEntry::from).collect();

    if let Some(best) = predictions.first() {
        info!(
            %request_id,
            class_name = %best.class_name,
            confidence = best.confidence,
            "Prediction complete"
        );
    }

    Ok(Json(PredictionResponse {
        filename,
        predictions,
    }))
}

/// Build prediction routes
pub fn predict_routes() -> Router<AppState> {
    Router::new().route("/predict", post(predict))
}
