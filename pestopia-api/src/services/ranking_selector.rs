//! Ranking selector
//!
//! Turns raw classifier scores into a probability distribution and picks the
//! top-K labeled predictions. Ordering is probability descending with ties
//! broken by model output index ascending, so equal scores always rank the
//! same way.

use pestopia_common::ClassLabels;
use thiserror::Error;

/// Number of predictions returned to clients
pub const TOP_K: usize = 3;

/// Ranking errors (configuration or model mismatch)
#[derive(Debug, Error, PartialEq)]
pub enum RankingError {
    #[error("Model produced {actual} scores but {expected} class labels are configured")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Model produced a non-finite score at index {index}")]
    NonFiniteScore { index: usize },
}

/// One labeled prediction at full precision
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPrediction {
    /// Model output index
    pub index: usize,
    pub label: String,
    pub probability: f64,
}

/// Result of ranking one score vector
#[derive(Debug, Clone)]
pub struct Ranking {
    /// Softmax over every class, in model output order
    pub probabilities: Vec<f64>,
    /// The K most probable classes
    pub top: Vec<RankedPrediction>,
}

/// Numerically stable softmax
///
/// The maximum score is subtracted before exponentiating, which leaves the
/// result unchanged but keeps `exp` from overflowing.
pub fn softmax(scores: &[f32]) -> Vec<f64> {
    let max = scores
        .iter()
        .map(|&s| s as f64)
        .fold(f64::NEG_INFINITY, f64::max);

    let exps: Vec<f64> = scores.iter().map(|&s| (s as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Rank `scores` against `labels` and keep the best `k`
pub fn rank(scores: &[f32], labels: &ClassLabels, k: usize) -> Result<Ranking, RankingError> {
    if scores.len() != labels.len() {
        return Err(RankingError::LengthMismatch {
            expected: labels.len(),
            actual: scores.len(),
        });
    }
    if let Some(index) = scores.iter().position(|s| !s.is_finite()) {
        return Err(RankingError::NonFiniteScore { index });
    }

    let probabilities = softmax(scores);

    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    // Stable sort keeps ascending index order among equal probabilities
    order.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));

    let top = order
        .into_iter()
        .take(k)
        .filter_map(|index| {
            labels.get(index).map(|label| RankedPrediction {
                index,
                label: label.to_string(),
                probability: probabilities[index],
            })
        })
        .collect();

    Ok(Ranking { probabilities, top })
}
