//! Liveness and health endpoints

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::services::ClassifierState;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" when every collaborator is usable, otherwise "degraded"
    pub status: String,
    /// Module name ("pestopia-api")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    pub classifier: ClassifierState,
    /// Configured compute device (`auto`, `cpu`, `cuda:<id>`)
    pub device: String,
    /// Why the classifier cannot serve
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier_error: Option<String>,
    pub generation_configured: bool,
    /// Rows in the pesticide reference table
    pub pesticide_entries: usize,
}

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "API is running." }))
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let classifier = state.classifier.state();
    let generation_configured = state.generator.is_configured();
    let pesticide_entries = state.lookup.len();

    let healthy = classifier == ClassifierState::Ready
        && generation_configured
        && pesticide_entries > 0;

    Json(HealthResponse {
        status: (if healthy { "ok" } else { "degraded" }).to_string(),
        module: "pestopia-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        classifier,
        device: state.classifier.device().to_string(),
        classifier_error: state.classifier.unavailable_reason(),
        generation_configured,
        pesticide_entries,
    })
}

/// Build liveness and health routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
}
