//! Recommendation generator
//!
//! Builds the fixed advisory prompt for a pest and hands it to the configured
//! [`TextGenerator`]. The raw answer is returned untouched; interpreting it is
//! the structured extractor's job.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::text_generation::{GenerationError, TextGenerator};

/// Section markers, in the order the prompt requests them
pub const SECTION_MARKERS: [&str; 4] = [
    "# PEST INFO",
    "# IPM SOLUTIONS",
    "# CHEMICAL SOLUTIONS",
    "# PREVENTION TIPS",
];

/// Build the advisory prompt for `pest_name`
pub fn build_prompt(pest_name: &str) -> String {
    format!(
        "You are an agricultural entomologist advising smallholder farmers.\n\
         Give practical management guidance for the crop pest \"{pest}\".\n\
         \n\
         Answer in markdown using exactly these four headings, in this order, \
         and no other headings:\n\
         \n\
         {info}\n\
         Two or three sentences describing the pest, the crops it attacks and the damage it causes.\n\
         \n\
         {ipm}\n\
         - One integrated pest management practice per bullet (biological, cultural or mechanical control).\n\
         \n\
         {chemical}\n\
         - One pesticide per bullet, formatted as `Pesticide name: short note on when and how it is used`.\n\
         - End this section with a line starting with \"CRITICAL DISCLAIMER:\" telling the reader to \
         follow the product label and local agricultural regulations and to consult a local \
         extension officer before applying any chemical.\n\
         \n\
         {prevention}\n\
         - One preventive measure per bullet.\n",
        pest = pest_name,
        info = SECTION_MARKERS[0],
        ipm = SECTION_MARKERS[1],
        chemical = SECTION_MARKERS[2],
        prevention = SECTION_MARKERS[3],
    )
}

/// Issues advisory requests against an optional collaborator
pub struct RecommendationGenerator {
    backend: Option<Arc<dyn TextGenerator>>,
    timeout: Duration,
}

impl RecommendationGenerator {
    pub fn new(backend: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            timeout,
        }
    }

    /// Generator with no collaborator; every request fails with `Unavailable`
    pub fn disabled() -> Self {
        Self {
            backend: None,
            timeout: Duration::ZERO,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Raw guidance text for `pest_name`
    ///
    /// No retry: a timeout, collaborator error or blank answer fails the request.
    pub async fn generate(&self, pest_name: &str) -> Result<String, GenerationError> {
        let backend = self.backend.as_ref().ok_or(GenerationError::Unavailable)?;
        let prompt = build_prompt(pest_name);

        debug!(generator = backend.name(), pest = %pest_name, "Sending advisory prompt");

        let text = tokio::time::timeout(self.timeout, backend.generate(&prompt))
            .await
            .map_err(|_| {
                warn!(generator = backend.name(), "Text generation timed out");
                GenerationError::Failed(format!(
                    "no response within {} seconds",
                    self.timeout.as_secs()
                ))
            })??;

        if text.trim().is_empty() {
            return Err(GenerationError::Failed("empty response".to_string()));
        }
        Ok(text)
    }
}
