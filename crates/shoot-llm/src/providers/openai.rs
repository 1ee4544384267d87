use async_trait::async_trait;
use reqwest::Client;

use crate::provider::{error_for_status, LLMProvider, Result};
use crate::types::{LLMRequest, LLMResponse};

use super::common::openai_compat::{build_openai_compat_body, parse_openai_compat_response};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Any endpoint speaking the OpenAI chat-completions API.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.api_key)
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse> {
        let body = build_openai_compat_body(request);
        log::debug!(
            "OpenAI request: model={}, messages={}, tools={}",
            request.model,
            request.messages.len(),
            request.tools.len()
        );

        let response = self
            .authorize(self.client.post(format!("{}/chat/completions", self.base_url)))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let text = response.text().await?;
        parse_openai_compat_response(&text)
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .authorize(self.client.get(format!("{}/models", self.base_url)))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }
        Ok(())
    }
}
