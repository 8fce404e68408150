//! `/predict` response model

use serde::{Deserialize, Serialize};

use crate::services::ranking_selector::RankedPrediction;

/// Decimal places kept in client-facing confidences
const CONFIDENCE_DECIMALS: i32 = 4;

/// One labeled prediction as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionEntry {
    pub class_name: String,
    /// Probability in [0, 1], rounded to 4 decimal places
    pub confidence: f64,
}

impl From<&RankedPrediction> for PredictionEntry {
    fn from(prediction: &RankedPrediction) -> Self {
        let scale = 10f64.powi(CONFIDENCE_DECIMALS);
        Self {
            class_name: prediction.label.clone(),
            confidence: (prediction.probability * scale).round() / scale,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Client-supplied filename of the upload, if any
    pub filename: Option<String>,
    pub predictions: Vec<PredictionEntry>,
}
