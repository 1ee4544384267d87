//! Declarative configuration for agents, collectors, tool servers and
//! response schemas.
//!
//! A document is loaded once at startup by [`load_config`]; every problem it
//! has is collected into a single [`ConfigError::Validation`] so the service
//! can refuse to start with a complete report.

pub mod env;
pub mod error;
pub mod loader;
pub mod model;
pub mod prompt;
pub mod validate;

pub use error::{ConfigError, ValidationError};
pub use loader::{load_config, load_config_str};
pub use model::{
    AgentProfile, AgentSpec, Budget, CollectorSpec, Configuration, Connection, ModelPricing,
    ToolServerSpec,
};
pub use prompt::{merge_variables, PromptTemplate};
