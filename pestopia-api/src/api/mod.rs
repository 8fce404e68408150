//! HTTP API handlers for pestopia-api

pub mod health;
pub mod predict;
pub mod recommend;

pub use health::health_routes;
pub use predict::predict_routes;
pub use recommend::recommend_routes;
