//! Image classification pipeline: preprocess → classify → rank

use thiserror::Error;

use super::classifier_service::{ClassifierError, ClassifierService};
use super::image_preprocessor::{preprocess, PreprocessError};
use super::ranking_selector::{rank, Ranking, RankingError};

/// Any failure along the pipeline, tagged by stage
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Ranking(#[from] RankingError),
}

/// Classify one uploaded image and keep the `k` best predictions
///
/// CPU-bound; run on the blocking pool when called from async code.
pub fn classify_image(
    classifier: &ClassifierService,
    bytes: &[u8],
    k: usize,
) -> Result<Ranking, ClassificationError> {
    let tensor = preprocess(bytes)?;
    let scores = classifier.classify(&tensor)?;
    Ok(rank(&scores, classifier.labels(), k)?)
}
