use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shoot_core::{Message, TokenUsage, ToolCall, ToolSchema};

use crate::provider::LLMError;

/// Provider-neutral request for one completion.
#[derive(Debug, Clone, Default)]
pub struct LLMRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl LLMRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>, tools: Vec<ToolSchema>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    MaxTokens,
    ToolCalls,
    ContentFiltered,
    Other,
}

impl FinishReason {
    /// OpenAI-style `finish_reason` values.
    pub fn from_openai(reason: Option<&str>) -> Self {
        match reason {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::MaxTokens,
            Some("tool_calls") | Some("function_call") => FinishReason::ToolCalls,
            Some("content_filter") => FinishReason::ContentFiltered,
            _ => FinishReason::Other,
        }
    }

    /// Anthropic `stop_reason` values.
    pub fn from_anthropic(reason: Option<&str>) -> Self {
        match reason {
            Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
            Some("max_tokens") => FinishReason::MaxTokens,
            Some("tool_use") => FinishReason::ToolCalls,
            Some("refusal") => FinishReason::ContentFiltered,
            _ => FinishReason::Other,
        }
    }
}

/// Decoded tool-call arguments, or why decoding failed.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArguments {
    Decoded(Map<String, Value>),
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallPart {
    pub id: String,
    pub name: String,
    /// Arguments as the provider encoded them, kept for the transcript.
    pub raw_arguments: String,
    pub arguments: ToolArguments,
}

impl ToolCallPart {
    /// Decodes `raw` into an argument map. Decode failures are kept on the
    /// part so the caller can report them against this call.
    pub fn decode(id: impl Into<String>, name: impl Into<String>, raw: impl Into<String>) -> Self {
        let name = name.into();
        let raw = raw.into();
        let arguments = match shoot_core::parse_tool_args(&raw) {
            Ok(map) => ToolArguments::Decoded(map),
            Err(error) => ToolArguments::Malformed(
                LLMError::MalformedArguments {
                    tool: name.clone(),
                    reason: error.to_string(),
                }
                .to_string(),
            ),
        };

        Self {
            id: id.into(),
            name,
            raw_arguments: raw,
            arguments,
        }
    }

    pub fn to_tool_call(&self) -> ToolCall {
        ToolCall::new(&self.id, &self.name, &self.raw_arguments)
    }

    pub fn decode_error(&self) -> Option<&str> {
        match &self.arguments {
            ToolArguments::Malformed(reason) => Some(reason),
            ToolArguments::Decoded(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LLMResponse {
    pub text: Vec<String>,
    pub tool_calls: Vec<ToolCallPart>,
    pub finish_reason: FinishReason,
    pub usage: TokenUsage,
}

impl LLMResponse {
    pub fn text(&self) -> String {
        self.text.join("")
    }

    /// The assistant turn this response adds to a transcript.
    pub fn to_message(&self) -> Message {
        let calls: Vec<ToolCall> = self.tool_calls.iter().map(ToolCallPart::to_tool_call).collect();
        Message::assistant(self.text(), Some(calls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reasons_map_from_both_vocabularies() {
        assert_eq!(FinishReason::from_openai(Some("length")), FinishReason::MaxTokens);
        assert_eq!(FinishReason::from_openai(Some("content_filter")), FinishReason::ContentFiltered);
        assert_eq!(FinishReason::from_openai(None), FinishReason::Other);
        assert_eq!(FinishReason::from_anthropic(Some("tool_use")), FinishReason::ToolCalls);
        assert_eq!(FinishReason::from_anthropic(Some("end_turn")), FinishReason::Stop);
        assert_eq!(FinishReason::from_anthropic(Some("pause_turn")), FinishReason::Other);
    }

    #[test]
    fn decode_keeps_malformed_arguments_on_the_part() {
        let part = ToolCallPart::decode("call_1", "kubernetes", "{\"query\": ");
        let reason = part.decode_error().unwrap();
        assert!(reason.contains("Malformed arguments for tool 'kubernetes'"));
        assert_eq!(part.to_tool_call().function.arguments, "{\"query\": ");
    }

    #[test]
    fn to_message_carries_tool_calls() {
        let response = LLMResponse {
            text: vec!["Checking ".to_string(), "pods".to_string()],
            tool_calls: vec![ToolCallPart::decode("c1", "kube", "{\"query\":\"pods\"}")],
            finish_reason: FinishReason::ToolCalls,
            usage: TokenUsage::new(10, 2),
        };
        let message = response.to_message();
        assert_eq!(message.content, "Checking pods");
        assert_eq!(message.tool_calls.unwrap()[0].function.name, "kube");
    }
}
