//! Text-generation collaborator
//!
//! [`TextGenerator`] is the seam between the recommendation pipeline and
//! whatever produces the guidance text. The production implementation talks to
//! any OpenAI-compatible chat-completions endpoint (OpenAI, vLLM, Ollama, ...).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("pestopia-api/", env!("CARGO_PKG_VERSION"));

/// Generation errors
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No collaborator configured
    #[error("Text generation service is not configured")]
    Unavailable,

    /// Collaborator errored, timed out, or returned nothing
    #[error("Text generation failed: {0}")]
    Failed(String),
}

/// Prompt in, free text out
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generator identifier for logs
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client
pub struct ChatCompletionsClient {
    http_client: reqwest::Client,
    completions_url: String,
    model: String,
    api_key: Option<String>,
}

impl ChatCompletionsClient {
    /// `endpoint` is the API base URL; `/chat/completions` is appended
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Failed(e.to_string()))?;

        Ok(Self {
            http_client,
            completions_url: format!("{}/chat/completions", endpoint.trim_end_matches('/')),
            model: model.into(),
            api_key,
        })
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.3,
        };

        debug!(url = %self.completions_url, model = %self.model, "Requesting completion");

        let mut request = self.http_client.post(&self.completions_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Failed("request timed out".to_string())
            } else {
                GenerationError::Failed(format!("network error: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            // Upstream bodies are logged only, never returned to callers
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %error_text, "Completion request rejected");
            return Err(GenerationError::Failed(format!(
                "API error {}",
                status.as_u16()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Failed(format!("unparseable response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::Failed("response contained no message".to_string()))
    }
}
