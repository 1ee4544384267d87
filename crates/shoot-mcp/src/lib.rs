//! Tool-server gateway speaking the Model Context Protocol.
//!
//! A [`ToolHandle`] is one live connection to one declared tool server. It
//! only ever exposes and invokes the tools on that server's allow-list.
//! Handles are owned by the run that opened them; [`ToolSet`] groups the
//! handles of one collector run and releases them when the run ends.

pub mod error;
pub mod executor;
pub mod handle;
pub mod protocol;
pub mod readiness;
pub mod tool_index;
pub mod toolset;
pub mod transports;
pub mod types;

pub use error::{McpError, Result};
pub use executor::McpToolExecutor;
pub use handle::ToolHandle;
pub use readiness::{probe_server, probe_servers, ServerProbe};
pub use tool_index::ToolIndex;
pub use toolset::ToolSet;
pub use types::{McpCallResult, McpContentItem, ToolDescriptor};
