pub mod error;
pub mod events;
pub mod metrics;
pub mod types;

pub use error::AgentError;
pub use events::{RunEvent, TokenUsage};
pub use metrics::{InvestigationMetrics, RunMetrics};
pub use types::{Message, Role, RunKind, RunStatus};
