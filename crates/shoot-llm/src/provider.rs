use async_trait::async_trait;
use thiserror::Error;

use crate::types::{LLMRequest, LLMResponse};

/// Failure of one model call. Never partially applied: a response either
/// converts completely or the whole call fails.
#[derive(Error, Debug)]
pub enum LLMError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Malformed provider payload: {0}")]
    Protocol(String),

    #[error("Malformed arguments for tool '{tool}': {reason}")]
    MalformedArguments { tool: String, reason: String },
}

pub type Result<T> = std::result::Result<T, LLMError>;

/// One model provider behind a single non-streaming call.
///
/// Implementations are stateless per call and safe to share between
/// concurrent runs.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Provider name used in logs.
    fn name(&self) -> &str;

    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse>;

    /// Confirms the endpoint is reachable with the configured credentials.
    async fn health_check(&self) -> Result<()>;
}

/// Maps a non-success HTTP response to an error.
pub(crate) async fn error_for_status(response: reqwest::Response) -> LLMError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        LLMError::Auth(format!("HTTP {}: {}", status, text))
    } else {
        LLMError::Api(format!("HTTP {}: {}", status, text))
    }
}
