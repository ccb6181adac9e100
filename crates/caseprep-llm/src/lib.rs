mod anthropic;
mod mock;
mod provider;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use mock::MockProvider;
pub use provider::{
    CompletionError, CompletionProvider, CompletionRequest, CompletionResponse, CompletionStream,
    FinishReason, Message, MessageRole, ProviderInfo, StreamChunk,
};
