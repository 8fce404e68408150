//! Error types for pestopia-api
//!
//! Every component error funnels into [`ApiError`], which fixes the HTTP
//! status for each failure class.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::{
    ClassificationError, ClassifierError, GenerationError, PreprocessError, RankingError,
};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Request body exceeds the upload limit (413)
    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    /// Upload could not be decoded as an image (400)
    #[error("Invalid image file: {0}")]
    InvalidImage(String),

    /// Classifier never became ready (503)
    #[error("Model is not loaded: {0}")]
    ModelUnavailable(String),

    /// Model output disagrees with the configured labels (500)
    #[error("Ranking failed: {0}")]
    Ranking(#[from] RankingError),

    /// No text-generation collaborator configured (503)
    #[error("Recommendation service is not configured")]
    GenerationUnavailable,

    /// Collaborator errored, timed out or returned nothing (502)
    #[error("Recommendation generation failed: {0}")]
    GenerationFailed(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(format!("malformed multipart body: {}", err.body_text()))
        }
    }
}

impl From<PreprocessError> for ApiError {
    fn from(err: PreprocessError) -> Self {
        match err {
            PreprocessError::InvalidImage(msg) => ApiError::InvalidImage(msg),
        }
    }
}

impl From<ClassifierError> for ApiError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::ModelUnavailable(msg) => ApiError::ModelUnavailable(msg),
            ClassifierError::Inference(msg) => ApiError::Internal(format!("inference failed: {}", msg)),
        }
    }
}

impl From<ClassificationError> for ApiError {
    fn from(err: ClassificationError) -> Self {
        match err {
            ClassificationError::Preprocess(e) => e.into(),
            ClassificationError::Classifier(e) => e.into(),
            ClassificationError::Ranking(e) => e.into(),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Unavailable => ApiError::GenerationUnavailable,
            GenerationError::Failed(msg) => ApiError::GenerationFailed(msg),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ModelUnavailable(_) | ApiError::GenerationUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
            ApiError::Ranking(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::InvalidImage(_) => "INVALID_IMAGE",
            ApiError::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            ApiError::Ranking(_) => "RANKING_ERROR",
            ApiError::GenerationUnavailable => "GENERATION_UNAVAILABLE",
            ApiError::GenerationFailed(_) => "GENERATION_FAILED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        // `detail` mirrors `error.message` for clients that read a flat field
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
            },
            "detail": message,
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
