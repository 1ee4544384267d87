pub mod anthropic;
pub mod common;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAIProvider;
