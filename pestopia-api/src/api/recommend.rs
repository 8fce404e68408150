//! POST /recommend
//!
//! Pest name → structured management guidance.

use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{RecommendRequest, RecommendationRecord},
    services::extract_recommendation,
    AppState,
};

pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendRequest>,
) -> ApiResult<Json<RecommendationRecord>> {
    let request_id = Uuid::new_v4();
    let pest_name = request.pest_name.trim();

    if pest_name.is_empty() {
        return Err(ApiError::BadRequest("pest_name must not be empty".to_string()));
    }

    info!(%request_id, pest = %pest_name, "Generating recommendation");

    let text = state.generator.generate(pest_name).await.map_err(|e| {
        warn!(%request_id, "Recommendation generation failed: {}", e);
        ApiError::from(e)
    })?;

    let extraction = extract_recommendation(pest_name, &text, &state.lookup);

    info!(
        %request_id,
        degraded = extraction.is_degraded(),
        degraded_sections = extraction.issues.len(),
        used_lookup_fallback = extraction.used_lookup_fallback,
        "Recommendation complete"
    );

    Ok(Json(extraction.record))
}

/// Build recommendation routes
pub fn recommend_routes() -> Router<AppState> {
    Router::new().route("/recommend", post(recommend))
}
