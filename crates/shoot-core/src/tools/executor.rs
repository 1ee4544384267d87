use async_trait::async_trait;
use thiserror::Error;

use crate::tools::{ToolCall, ToolResult, ToolSchema};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool not authorized: {0}")]
    NotAuthorized(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    /// The backing tool server could not be reached at all.
    #[error("Tool server unavailable: {0}")]
    Unavailable(String),
}

impl ToolError {
    /// Errors that leave the run unable to make progress.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ToolError::Unavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, ToolError>;

/// A tool surface that a run is allowed to call.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;
    fn list_tools(&self) -> Vec<ToolSchema>;
}

/// Decodes a model-supplied argument string into a JSON object.
pub fn parse_tool_args(arguments: &str) -> Result<serde_json::Map<String, serde_json::Value>> {
    let args_raw = arguments.trim();

    if args_raw.is_empty() {
        return Ok(serde_json::Map::new());
    }

    match serde_json::from_str(args_raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(ToolError::InvalidArguments(format!(
            "Expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(error) => Err(ToolError::InvalidArguments(format!(
            "Invalid JSON arguments: {error}"
        ))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
