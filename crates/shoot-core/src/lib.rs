pub mod agent;
pub mod response;
pub mod tools;

pub use agent::error::AgentError;
pub use agent::events::{RunEvent, TokenUsage};
pub use agent::metrics::{InvestigationMetrics, RunMetrics};
pub use agent::types::{Message, Role, RunKind, RunStatus};
pub use response::{
    format_response, parse_machine_body, FormatError, FormattedResponse, RenderMode,
    ResponseSchema,
};
pub use tools::{
    parse_tool_args, FunctionCall, FunctionSchema, ToolCall, ToolError, ToolExecutor, ToolResult,
    ToolSchema,
};
