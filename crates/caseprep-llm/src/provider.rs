use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur when talking to a completion endpoint
#[derive(Error, Debug, Clone)]
pub enum CompletionError {
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u32 },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u32 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to parse provider response: {0}")]
    Parse(String),
}

impl CompletionError {
    /// Whether a retry with backoff has any chance of succeeding
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CompletionError::RateLimited { .. }
                | CompletionError::Unavailable(_)
                | CompletionError::Network(_)
                | CompletionError::Timeout { .. }
        )
    }
}

/// Who authored a message in the completion conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single message sent to the completion endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Request for a single completion
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// Ordered conversation messages (history + current user message)
    pub messages: Vec<Message>,
    /// System instruction, sent out of band from the message list
    pub system_prompt: Option<String>,
    /// Response-length budget
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, role: MessageRole, content: impl Into<String>) -> Self {
        self.messages.push(Message {
            role,
            content: content.into(),
        });
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    Error,
}

/// A completed (non-streamed) response
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub finish_reason: FinishReason,
}

/// One incremental piece of a streamed response
#[derive(Debug, Clone)]
pub struct StreamChunk {
    /// New content in this chunk
    pub delta: String,
    /// Present only on the final chunk
    pub finish_reason: Option<FinishReason>,
}

impl StreamChunk {
    pub fn content(delta: impl Into<String>) -> Self {
        Self {
            delta: delta.into(),
            finish_reason: None,
        }
    }

    pub fn final_chunk(finish_reason: FinishReason) -> Self {
        Self {
            delta: String::new(),
            finish_reason: Some(finish_reason),
        }
    }

    pub fn is_final(&self) -> bool {
        self.finish_reason.is_some()
    }
}

pub type CompletionStream =
    Pin<Box<dyn Stream<Item = Result<StreamChunk, CompletionError>> + Send>>;

/// Identifying information for a configured provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub model: String,
}

/// The core abstraction over hosted completion endpoints
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a single completion and return it whole
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError>;

    /// Generate a completion as a stream of chunks
    async fn stream_complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionStream, CompletionError>;

    /// Provider name and configured model
    fn provider_info(&self) -> ProviderInfo;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new()
            .with_message(MessageRole::User, "Hello")
            .with_system_prompt("Be helpful")
            .with_max_tokens(100)
            .with_temperature(0.5);

        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, MessageRole::User);
        assert_eq!(request.system_prompt, Some("Be helpful".to_string()));
        assert_eq!(request.max_tokens, Some(100));
        assert_eq!(request.temperature, Some(0.5));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(CompletionError::RateLimited {
            retry_after_secs: 30
        }
        .is_retryable());
        assert!(CompletionError::Unavailable("down".into()).is_retryable());
        assert!(CompletionError::Network("reset".into()).is_retryable());
        assert!(CompletionError::Timeout { timeout_secs: 60 }.is_retryable());

        assert!(!CompletionError::AuthenticationFailed.is_retryable());
        assert!(!CompletionError::InvalidRequest("bad".into()).is_retryable());
        assert!(!CompletionError::Parse("garbled".into()).is_retryable());
    }

    #[test]
    fn test_stream_chunk_finality() {
        let chunk = StreamChunk::content("Hello");
        assert!(!chunk.is_final());

        let last = StreamChunk::final_chunk(FinishReason::Stop);
        assert!(last.is_final());
        assert!(last.delta.is_empty());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
