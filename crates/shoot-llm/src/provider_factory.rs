//! Provider Factory
//!
//! Creates LLM providers from service settings.

use std::sync::Arc;

use crate::provider::{LLMError, LLMProvider};
use crate::providers::{AnthropicProvider, OpenAIProvider};

/// Available provider types
pub const AVAILABLE_PROVIDERS: &[&str] = &["openai", "anthropic"];

#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub provider: String,
    pub api_key: String,
    pub base_url: Option<String>,
}

pub fn create_provider(settings: &ProviderSettings) -> Result<Arc<dyn LLMProvider>, LLMError> {
    let base_url = settings
        .base_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty());

    let provider: Arc<dyn LLMProvider> = match settings.provider.as_str() {
        "openai" => {
            let mut provider = OpenAIProvider::new(settings.api_key.clone());
            if let Some(url) = base_url {
                provider = provider.with_base_url(url);
            }
            Arc::new(provider)
        }
        "anthropic" => {
            if settings.api_key.is_empty() {
                return Err(LLMError::Auth(
                    "Anthropic provider requires an API key".to_string(),
                ));
            }
            let mut provider = AnthropicProvider::new(settings.api_key.clone());
            if let Some(url) = base_url {
                provider = provider.with_base_url(url);
            }
            Arc::new(provider)
        }
        other => {
            return Err(LLMError::Api(format!(
                "Unknown provider '{}'. Available: {}",
                other,
                AVAILABLE_PROVIDERS.join(", ")
            )))
        }
    };

    log::info!(
        "Using LLM provider '{}'{}",
        provider.name(),
        base_url.map(|url| format!(" at {url}")).unwrap_or_default()
    );
    Ok(provider)
}
