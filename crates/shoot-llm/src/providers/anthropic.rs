use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use shoot_core::{agent::Role, Message, TokenUsage, ToolSchema};

use crate::provider::{error_for_status, LLMError, LLMProvider, Result};
use crate::types::{FinishReason, LLMRequest, LLMResponse, ToolCallPart};

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The Messages API requires `max_tokens`.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| LLMError::Auth(format!("Invalid API key: {}", e)))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

/// Builds a Messages API body.
///
/// System turns are lifted into `system`; consecutive tool results are
/// grouped into a single user turn of `tool_result` blocks.
pub fn build_anthropic_request(request: &LLMRequest) -> Value {
    let mut system = Vec::new();
    let mut messages: Vec<Value> = Vec::new();

    for message in &request.messages {
        match message.role {
            Role::System => system.push(message.content.clone()),
            Role::User => messages.push(json!({
                "role": "user",
                "content": [{"type": "text", "text": message.content}],
            })),
            Role::Assistant => messages.push(assistant_blocks(message)),
            Role::Tool => {
                let block = json!({
                    "type": "tool_result",
                    "tool_use_id": message.tool_call_id.clone().unwrap_or_default(),
                    "content": message.content,
                });
                match messages.last_mut() {
                    Some(last) if is_tool_result_turn(last) => {
                        if let Some(content) = last["content"].as_array_mut() {
                            content.push(block);
                        }
                    }
                    _ => messages.push(json!({"role": "user", "content": [block]})),
                }
            }
        }
    }

    let mut body = json!({
        "model": request.model,
        "max_tokens": request.max_output_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "messages": messages,
    });

    if !system.is_empty() {
        body["system"] = json!(system.join("\n\n"));
    }
    if !request.tools.is_empty() {
        body["tools"] = json!(request.tools.iter().map(tool_to_anthropic).collect::<Vec<_>>());
    }
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }

    body
}

fn assistant_blocks(message: &Message) -> Value {
    let mut content = Vec::new();
    if !message.content.is_empty() {
        content.push(json!({"type": "text", "text": message.content}));
    }
    for call in message.tool_calls.iter().flatten() {
        // Calls with undecodable arguments are replayed with an empty input;
        // the paired tool result already explains the failure.
        let input = serde_json::from_str::<Value>(&call.function.arguments)
            .ok()
            .filter(Value::is_object)
            .unwrap_or_else(|| json!({}));
        content.push(json!({
            "type": "tool_use",
            "id": call.id,
            "name": call.function.name,
            "input": input,
        }));
    }
    json!({"role": "assistant", "content": content})
}

fn is_tool_result_turn(message: &Value) -> bool {
    message["role"] == "user"
        && message["content"]
            .as_array()
            .map(|blocks| blocks.iter().all(|block| block["type"] == "tool_result"))
            .unwrap_or(false)
}

fn tool_to_anthropic(tool: &ToolSchema) -> Value {
    json!({
        "name": tool.function.name,
        "description": tool.function.description,
        "input_schema": tool.function.parameters,
    })
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize, Default)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

pub fn parse_anthropic_response(body: &str) -> Result<LLMResponse> {
    let response: AnthropicResponse = serde_json::from_str(body)?;

    let mut text = Vec::new();
    let mut tool_calls = Vec::new();
    for block in response.content {
        match block {
            AnthropicBlock::Text { text: chunk } => text.push(chunk),
            AnthropicBlock::ToolUse { id, name, input } => {
                let raw = if input.is_null() {
                    "{}".to_string()
                } else {
                    input.to_string()
                };
                tool_calls.push(ToolCallPart::decode(id, name, raw));
            }
            AnthropicBlock::Other => {}
        }
    }

    Ok(LLMResponse {
        text,
        tool_calls,
        finish_reason: FinishReason::from_anthropic(response.stop_reason.as_deref()),
        usage: TokenUsage::new(response.usage.input_tokens, response.usage.output_tokens),
    })
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse> {
        let body = build_anthropic_request(request);
        log::debug!(
            "Anthropic request: model={}, messages={}, tools={}",
            request.model,
            request.messages.len(),
            request.tools.len()
        );

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .headers(self.build_headers()?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let text = response.text().await?;
        parse_anthropic_response(&text)
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .headers(self.build_headers()?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }
        Ok(())
    }
}
