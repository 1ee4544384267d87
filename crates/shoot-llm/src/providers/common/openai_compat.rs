//! OpenAI-compatible chat-completions serialization.
//!
//! Builds request bodies from transcript messages without leaking internal
//! fields (`id`, `created_at`) and converts completion payloads back into
//! [`LLMResponse`].

use serde::Deserialize;
use serde_json::{json, Value};
use shoot_core::{agent::Role, Message, TokenUsage, ToolSchema};

use crate::provider::{LLMError, Result};
use crate::types::{FinishReason, LLMRequest, LLMResponse, ToolCallPart};

pub fn messages_to_openai_compat_json(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };

            let mut msg = json!({
                "role": role,
                "content": m.content,
            });

            if let Some(tool_call_id) = &m.tool_call_id {
                msg["tool_call_id"] = json!(tool_call_id);
            }

            if let Some(tool_calls) = m.tool_calls.as_ref().filter(|calls| !calls.is_empty()) {
                msg["tool_calls"] = json!(tool_calls);
                if m.content.is_empty() {
                    msg["content"] = Value::Null;
                }
            }

            msg
        })
        .collect()
}

pub fn tools_to_openai_compat_json(tools: &[ToolSchema]) -> Vec<Value> {
    tools.iter().map(|t| json!(t)).collect()
}

/// Non-streaming chat-completions request body.
pub fn build_openai_compat_body(request: &LLMRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": messages_to_openai_compat_json(&request.messages),
        "stream": false,
    });

    if !request.tools.is_empty() {
        body["tools"] = json!(tools_to_openai_compat_json(&request.tools));
    }

    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }

    if let Some(max_tokens) = request.max_output_tokens {
        body["max_tokens"] = json!(max_tokens);
    }

    body
}

#[derive(Debug, Deserialize)]
struct OpenAICompatResponse {
    #[serde(default)]
    choices: Vec<OpenAICompatChoice>,
    #[serde(default)]
    usage: Option<OpenAICompatUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatChoice {
    message: OpenAICompatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAICompatToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatToolCall {
    id: Option<String>,
    function: Option<OpenAICompatFunction>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAICompatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: Option<u32>,
}

/// Converts a chat-completions payload into the neutral response.
pub fn parse_openai_compat_response(body: &str) -> Result<LLMResponse> {
    let response: OpenAICompatResponse = serde_json::from_str(body)?;

    let Some(choice) = response.choices.into_iter().next() else {
        return Err(LLMError::Protocol("response has no choices".to_string()));
    };

    let mut tool_calls = Vec::new();
    for (index, call) in choice.message.tool_calls.unwrap_or_default().into_iter().enumerate() {
        let function = call.function.ok_or_else(|| {
            LLMError::Protocol(format!("tool call {index} has no function"))
        })?;
        let name = function
            .name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| LLMError::Protocol(format!("tool call {index} has no name")))?;
        let id = call
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("call_{index}"));

        tool_calls.push(ToolCallPart::decode(
            id,
            name,
            function.arguments.unwrap_or_default(),
        ));
    }

    let usage = response.usage.unwrap_or_default();
    let mut token_usage = TokenUsage::new(usage.prompt_tokens, usage.completion_tokens);
    if let Some(total) = usage.total_tokens {
        token_usage.total_tokens = total;
    }

    Ok(LLMResponse {
        text: choice
            .message
            .content
            .filter(|content| !content.is_empty())
            .into_iter()
            .collect(),
        tool_calls,
        finish_reason: FinishReason::from_openai(choice.finish_reason.as_deref()),
        usage: token_usage,
    })
}
