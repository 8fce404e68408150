//! Request and response models for pestopia-api

pub mod prediction;
pub mod recommendation;

pub use prediction::{PredictionEntry, PredictionResponse};
pub use recommendation::{ChemicalSolution, RecommendRequest, RecommendationRecord};
