use crate::agent::metrics::InvestigationMetrics;
use crate::agent::types::RunStatus;
use crate::tools::ToolResult;
use serde::{Deserialize, Serialize};

/// Progress notifications emitted while an investigation runs.
///
/// Nested collector runs publish on the same channel as their coordinator;
/// `agent` tells them apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    Started {
        run_id: String,
        agent: String,
    },

    Text {
        agent: String,
        content: String,
    },

    ToolStart {
        agent: String,
        tool_call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },

    ToolComplete {
        agent: String,
        tool_call_id: String,
        result: ToolResult,
    },

    ToolError {
        agent: String,
        tool_call_id: String,
        error: String,
    },

    DelegationStart {
        parent: String,
        collector: String,
        query: String,
    },

    DelegationComplete {
        parent: String,
        collector: String,
        status: RunStatus,
    },

    RunFinished {
        run_id: String,
        agent: String,
        status: RunStatus,
        usage: TokenUsage,
    },

    Finished {
        request_id: String,
        agent: String,
        result: serde_json::Value,
        metrics: InvestigationMetrics,
    },

    Error {
        request_id: String,
        message: String,
    },
}

impl RunEvent {
    /// Whether this event closes an investigation stream.
    pub fn is_final(&self) -> bool {
        matches!(self, RunEvent::Finished { .. } | RunEvent::Error { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}
