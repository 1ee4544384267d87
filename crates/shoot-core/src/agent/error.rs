use thiserror::Error;

/// Terminal failures of a run or an investigation.
#[derive(Error, Debug, Clone)]
pub enum AgentError {
    #[error("Agent not found: {name} (available: {})", .available.join(", "))]
    AgentNotFound { name: String, available: Vec<String> },

    #[error("Several agents are configured, name one of: {}", .available.join(", "))]
    AgentRequired { available: Vec<String> },

    #[error("Model call failed: {0}")]
    Adapter(String),

    #[error("Tool invocation failed: {0}")]
    ToolInvocation(String),

    #[error("Agent '{agent}' exceeded its turn limit of {max_turns}")]
    TurnLimitExceeded { agent: String, max_turns: u32 },

    #[error("Agent '{agent}' timed out after {budget_secs}s (at turn {turn})")]
    TimedOut {
        agent: String,
        budget_secs: u64,
        turn: u32,
    },

    #[error("Response did not match schema: {0}")]
    SchemaValidation(String),

    #[error("Cancelled")]
    Cancelled,
}
