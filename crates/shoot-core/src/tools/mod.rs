pub mod executor;
pub mod types;

pub use executor::{parse_tool_args, Result, ToolError, ToolExecutor};
pub use types::{FunctionCall, FunctionSchema, ToolCall, ToolResult, ToolSchema};
