pub mod config;
pub mod delegation;
pub mod events;
pub mod investigator;
pub mod runner;

pub use config::RunConfig;
pub use delegation::{DelegationExecutor, McpProvisioner, ProvisionedTools, ToolProvisioner};
pub use events::EventSink;
pub use investigator::{InvestigationError, InvestigationOutcome, InvestigationRequest, Investigator};
pub use runner::{run_agent_loop, Run};
