pub mod provider;
pub mod provider_factory;
pub mod providers;
pub mod types;

pub use provider::{LLMError, LLMProvider, Result};
pub use provider_factory::{create_provider, ProviderSettings, AVAILABLE_PROVIDERS};
pub use providers::{AnthropicProvider, OpenAIProvider};
pub use types::{FinishReason, LLMRequest, LLMResponse, ToolArguments, ToolCallPart};
