use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use shoot_core::tools::executor::Result;
use shoot_core::{parse_tool_args, ToolCall, ToolError, ToolExecutor, ToolResult, ToolSchema};

use crate::error::McpError;
use crate::toolset::ToolSet;

/// Exposes a collector's open tool servers to its run, restricted to the
/// aliases the collector is allowed to call.
pub struct McpToolExecutor {
    tools: Arc<ToolSet>,
    allowed: Vec<String>,
    cancel: CancellationToken,
}

impl McpToolExecutor {
    pub fn new(tools: Arc<ToolSet>, allowed: Vec<String>, cancel: CancellationToken) -> Self {
        Self {
            tools,
            allowed,
            cancel,
        }
    }

    fn is_allowed(&self, alias: &str) -> bool {
        self.allowed.iter().any(|a| a == alias)
    }
}

fn map_error(error: McpError) -> ToolError {
    match error {
        McpError::ToolNotFound(name) => ToolError::NotFound(name),
        McpError::ToolNotAuthorized { server, tool } => {
            ToolError::NotAuthorized(format!("{server}/{tool}"))
        }
        other => ToolError::Execution(other.to_string()),
    }
}

#[async_trait]
impl ToolExecutor for McpToolExecutor {
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let alias = call.name();
        if !self.is_allowed(alias) {
            return Err(ToolError::NotAuthorized(alias.to_string()));
        }

        let arguments = parse_tool_args(&call.function.arguments)?;
        let result = self
            .tools
            .invoke(alias, Value::Object(arguments), &self.cancel)
            .await
            .map_err(map_error)?;

        if result.is_error {
            Ok(ToolResult::error(result.text()))
        } else {
            Ok(ToolResult::ok(result.text()))
        }
    }

    fn list_tools(&self) -> Vec<ToolSchema> {
        self.tools.schemas(&self.allowed)
    }
}
