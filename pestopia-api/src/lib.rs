//! pestopia-api library interface
//!
//! Exposes the application state, router and services for the binary and for
//! integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::DefaultBodyLimit, http::HeaderValue, Router};
use chrono::{DateTime, Utc};
use pestopia_common::{config::TomlConfig, ClassLabels};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::services::{
    ChatCompletionsClient, ClassifierService, Device, InferenceBackend, PesticideLookup,
    RecommendationGenerator, WeightSource, WeightStore,
};

/// Application state shared across handlers
///
/// Built once before the server starts; nothing in it changes afterwards.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<ClassifierService>,
    pub generator: Arc<RecommendationGenerator>,
    pub lookup: Arc<PesticideLookup>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Request body limit applied to the router
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        classifier: Arc<ClassifierService>,
        generator: Arc<RecommendationGenerator>,
        lookup: Arc<PesticideLookup>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            classifier,
            generator,
            lookup,
            startup_time: Utc::now(),
            max_upload_bytes,
        }
    }

    /// Build every collaborator from configuration
    ///
    /// Only an unparseable device aborts. A classifier that fails to load, a
    /// missing pesticide table or an absent generation endpoint leave the
    /// service running degraded.
    pub async fn bootstrap(
        config: &TomlConfig,
        llm_api_key: Option<String>,
    ) -> pestopia_common::Result<Self> {
        let device: Device = config
            .model
            .device
            .parse()
            .map_err(pestopia_common::Error::Config)?;

        let classifier = Arc::new(ClassifierService::new(ClassLabels::pest_classes(), device));
        match WeightStore::new(
            WeightSource::parse(&config.model.location),
            config.model.cache_path.clone(),
        ) {
            Ok(store) => {
                classifier.initialize(&store).await;
            }
            Err(e) => {
                classifier
                    .initialize_with(|_| async move {
                        Err::<Box<dyn InferenceBackend>, _>(e.to_string())
                    })
                    .await;
            }
        }

        let lookup = match PesticideLookup::load_csv(&config.pesticide_data_path) {
            Ok(table) => table,
            Err(e) => {
                warn!(
                    "Pesticide reference data unavailable ({}): {}",
                    config.pesticide_data_path.display(),
                    e
                );
                PesticideLookup::empty()
            }
        };

        let timeout = Duration::from_secs(config.generation.timeout_seconds);
        let generator = match &config.generation.endpoint {
            Some(endpoint) => match ChatCompletionsClient::new(
                endpoint,
                config.generation.model.clone(),
                llm_api_key,
                timeout,
            ) {
                Ok(client) => {
                    info!(endpoint = %endpoint, model = %config.generation.model, "Text generation configured");
                    RecommendationGenerator::new(Arc::new(client), timeout)
                }
                Err(e) => {
                    warn!("Text generation client could not be built: {}", e);
                    RecommendationGenerator::disabled()
                }
            },
            None => {
                warn!("No generation endpoint configured; /recommend will return 503");
                RecommendationGenerator::disabled()
            }
        };

        Ok(Self::new(
            classifier,
            Arc::new(generator),
            Arc::new(lookup),
            config.max_upload_bytes,
        ))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .merge(api::health_routes())
        .merge(api::predict_routes())
        .merge(api::recommend_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// CORS layer for the configured origins
///
/// Unparseable origins are skipped with a warning.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}
