use async_trait::async_trait;
use futures::stream;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::provider::{
    CompletionError, CompletionProvider, CompletionRequest, CompletionResponse, CompletionStream,
    FinishReason, ProviderInfo, StreamChunk,
};

/// Scripted completion provider for tests.
///
/// Queued replies are consumed in order; an exhausted queue fails the
/// request so tests catch unexpected extra calls.
#[derive(Clone, Default)]
pub struct MockProvider {
    replies: Arc<Mutex<VecDeque<Result<String, CompletionError>>>>,
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply
    pub fn with_reply(self, content: impl Into<String>) -> Self {
        self.replies
            .lock()
            .expect("mock lock poisoned")
            .push_back(Ok(content.into()));
        self
    }

    /// Queue an error
    pub fn with_error(self, error: CompletionError) -> Self {
        self.replies
            .lock()
            .expect("mock lock poisoned")
            .push_back(Err(error));
        self
    }

    /// Number of requests the provider has received
    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock lock poisoned").len()
    }

    /// Requests the provider has received, in order
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().expect("mock lock poisoned").clone()
    }

    fn next_reply(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        self.calls.lock().expect("mock lock poisoned").push(request);
        self.replies
            .lock()
            .expect("mock lock poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(CompletionError::Unavailable(
                    "mock reply queue exhausted".to_string(),
                ))
            })
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let content = self.next_reply(request)?;
        Ok(CompletionResponse {
            content,
            model: "mock-model".to_string(),
            finish_reason: FinishReason::Stop,
        })
    }

    async fn stream_complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionStream, CompletionError> {
        let content = self.next_reply(request)?;

        // Split into word-sized chunks so callers exercise concatenation
        let mut chunks: Vec<Result<StreamChunk, CompletionError>> = Vec::new();
        let mut rest = content.as_str();
        while !rest.is_empty() {
            let split = rest
                .char_indices()
                .nth(8)
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            let (piece, remainder) = rest.split_at(split);
            chunks.push(Ok(StreamChunk::content(piece)));
            rest = remainder;
        }
        chunks.push(Ok(StreamChunk::final_chunk(FinishReason::Stop)));

        Ok(Box::pin(stream::iter(chunks)))
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "mock".to_string(),
            model: "mock-model".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use crate::provider::MessageRole;

    #[tokio::test]
    async fn test_replies_consumed_in_order() {
        let provider = MockProvider::new().with_reply("first").with_reply("second");

        let a = provider.complete(CompletionRequest::new()).await.unwrap();
        let b = provider.complete(CompletionRequest::new()).await.unwrap();
        assert_eq!(a.content, "first");
        assert_eq!(b.content, "second");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_queue_errors() {
        let provider = MockProvider::new();
        let result = provider.complete(CompletionRequest::new()).await;
        assert!(matches!(result, Err(CompletionError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_stream_reassembles_to_reply() {
        let provider =
            MockProvider::new().with_reply("a reply long enough to span several chunks");

        let mut stream = provider
            .stream_complete(CompletionRequest::new().with_message(MessageRole::User, "hi"))
            .await
            .unwrap();

        let mut buffer = String::new();
        let mut saw_final = false;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            buffer.push_str(&chunk.delta);
            saw_final = chunk.is_final();
        }

        assert_eq!(buffer, "a reply long enough to span several chunks");
        assert!(saw_final);
    }
}
