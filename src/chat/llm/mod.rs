//! LLM provider abstraction and the Azure OpenAI implementation.

pub mod azure;
pub mod provider;
pub mod types;

pub use azure::AzureOpenAIProvider;
pub use provider::{CompletionOptions, LlmError, LlmProvider};
pub use types::{
    CompletionResponse, FinishReason, Message, MessageRole, TokenUsage, ToolCall, ToolDefinition,
};
