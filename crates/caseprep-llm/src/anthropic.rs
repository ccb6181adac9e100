use futures::stream::{self, StreamExt};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use async_trait::async_trait;

use crate::provider::{
    CompletionError, CompletionProvider, CompletionRequest, CompletionResponse, CompletionStream,
    FinishReason, MessageRole, ProviderInfo, StreamChunk,
};

/// Anthropic API version header value
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Configuration for the Anthropic completion endpoint
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    api_key: Secret<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// Completion provider backed by Anthropic's messages API
pub struct AnthropicProvider {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::InvalidRequest(format!("http client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url)
    }

    fn to_wire_request(&self, request: &CompletionRequest, stream: bool) -> WireRequest {
        let messages = request
            .messages
            .iter()
            .filter_map(|msg| {
                // System content travels in the dedicated field, not the message list
                let role = match msg.role {
                    MessageRole::System => return None,
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                };
                Some(WireMessage {
                    role: role.to_string(),
                    content: msg.content.clone(),
                })
            })
            .collect();

        WireRequest {
            model: self.config.model.clone(),
            messages,
            system: request.system_prompt.clone(),
            max_tokens: request.max_tokens.unwrap_or(1024),
            temperature: request.temperature,
            stream: if stream { Some(true) } else { None },
        }
    }

    async fn send_request(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<Response, CompletionError> {
        let wire = self.to_wire_request(request, stream);

        debug!(
            model = %wire.model,
            messages = wire.messages.len(),
            stream,
            "Sending completion request"
        );

        self.client
            .post(self.messages_url())
            .header("x-api-key", self.config.api_key())
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .header("Content-Type", "application/json")
            .json(&wire)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout {
                        timeout_secs: self.config.timeout.as_secs() as u32,
                    }
                } else if e.is_connect() {
                    CompletionError::Network(format!("connection failed: {}", e))
                } else {
                    CompletionError::Network(e.to_string())
                }
            })
    }

    async fn handle_response_status(&self, response: Response) -> Result<Response, CompletionError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 => Err(CompletionError::AuthenticationFailed),
            429 => Err(CompletionError::RateLimited {
                retry_after_secs: parse_retry_after(&error_body),
            }),
            400 => Err(CompletionError::InvalidRequest(error_body)),
            500..=599 => Err(CompletionError::Unavailable(format!(
                "server error {}: {}",
                status, error_body
            ))),
            _ => Err(CompletionError::Network(format!(
                "unexpected status {}: {}",
                status, error_body
            ))),
        }
    }

    async fn parse_response(
        &self,
        response: Response,
    ) -> Result<CompletionResponse, CompletionError> {
        let response = self.handle_response_status(response).await?;

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Parse(format!("response body: {}", e)))?;

        let content = wire
            .content
            .into_iter()
            .filter_map(|block| {
                if block.block_type == "text" {
                    block.text
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            content,
            model: wire.model,
            finish_reason: finish_reason_from_stop(wire.stop_reason.as_deref()),
        })
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let mut retry_count = 0;

        loop {
            let result = match self.send_request(&request, false).await {
                Ok(response) => self.parse_response(response).await,
                Err(err) => Err(err),
            };

            match result {
                Ok(completion) => return Ok(completion),
                Err(err) => {
                    if !err.is_retryable() || retry_count >= self.config.max_retries {
                        return Err(err);
                    }
                    // Exponential backoff: 1s, 2s, 4s, ...
                    let delay = Duration::from_secs(1 << retry_count);
                    debug!(error = %err, retry = retry_count + 1, "Retrying completion");
                    sleep(delay).await;
                    retry_count += 1;
                }
            }
        }
    }

    async fn stream_complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionStream, CompletionError> {
        let response = self.send_request(&request, true).await?;
        let response = self.handle_response_status(response).await?;

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| CompletionError::Network(format!("stream: {}", e))))
            .scan(SseParser::default(), |parser, chunk| {
                let events = match chunk {
                    Ok(bytes) => parser.feed(&String::from_utf8_lossy(&bytes)),
                    Err(e) => vec![Err(e)],
                };
                futures::future::ready(Some(events))
            })
            .flat_map(stream::iter);

        Ok(Box::pin(stream))
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "anthropic".to_string(),
            model: self.config.model.clone(),
        }
    }
}

fn finish_reason_from_stop(stop_reason: Option<&str>) -> FinishReason {
    match stop_reason {
        Some("max_tokens") => FinishReason::Length,
        _ => FinishReason::Stop,
    }
}

/// Pulls the advisory wait out of a rate-limit error body, defaulting to 60s
fn parse_retry_after(error_body: &str) -> u32 {
    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(error_body) {
        if let Some(msg) = parsed
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            if let Some(idx) = msg.find("try again in ") {
                let rest = &msg[idx + 13..];
                if let Some(num_end) = rest.find(|c: char| !c.is_ascii_digit()) {
                    if let Ok(secs) = rest[..num_end].parse::<u32>() {
                        return secs;
                    }
                }
            }
        }
    }
    60
}

/// Incremental parser for Anthropic's SSE event format.
///
/// Events arrive as `event:`/`data:` line pairs; a single network chunk may
/// end mid-line, so unterminated input is carried over to the next feed.
#[derive(Default)]
struct SseParser {
    carry: String,
    current_event: String,
}

impl SseParser {
    fn feed(&mut self, text: &str) -> Vec<Result<StreamChunk, CompletionError>> {
        self.carry.push_str(text);

        let complete = match self.carry.rfind('\n') {
            Some(pos) => {
                let rest = self.carry.split_off(pos + 1);
                std::mem::replace(&mut self.carry, rest)
            }
            None => return Vec::new(),
        };

        let mut results = Vec::new();
        for line in complete.lines() {
            if let Some(event_type) = line.strip_prefix("event: ") {
                self.current_event = event_type.to_string();
            } else if let Some(data) = line.strip_prefix("data: ") {
                self.handle_data(data, &mut results);
            }
        }
        results
    }

    fn handle_data(&self, data: &str, results: &mut Vec<Result<StreamChunk, CompletionError>>) {
        match self.current_event.as_str() {
            "content_block_delta" => {
                if let Ok(delta) = serde_json::from_str::<ContentBlockDelta>(data) {
                    if let Some(text) = delta.delta.text {
                        if !text.is_empty() {
                            results.push(Ok(StreamChunk::content(text)));
                        }
                    }
                }
            }
            "message_delta" => {
                if let Ok(delta) = serde_json::from_str::<MessageDelta>(data) {
                    results.push(Ok(StreamChunk::final_chunk(finish_reason_from_stop(
                        delta.delta.stop_reason.as_deref(),
                    ))));
                }
            }
            "error" => {
                if let Ok(error) = serde_json::from_str::<StreamError>(data) {
                    results.push(Err(CompletionError::Unavailable(
                        error
                            .error
                            .message
                            .unwrap_or_else(|| "stream error".to_string()),
                    )));
                }
            }
            // message_start, content_block_start, ping, message_stop
            _ => {}
        }
    }
}

// ----- Wire types -----

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDelta {
    delta: TextDelta,
}

#[derive(Debug, Deserialize)]
struct TextDelta {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    delta: MessageDeltaContent,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaContent {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    error: StreamErrorContent,
}

#[derive(Debug, Deserialize)]
struct StreamErrorContent {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = AnthropicConfig::new("test-key")
            .with_model("claude-3-haiku-20240307")
            .with_base_url("https://custom.api.test")
            .with_timeout(Duration::from_secs(30))
            .with_max_retries(5);

        assert_eq!(config.model, "claude-3-haiku-20240307");
        assert_eq!(config.base_url, "https://custom.api.test");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.api_key(), "test-key");
    }

    #[test]
    fn test_sse_content_delta() {
        let mut parser = SseParser::default();
        let chunks = parser.feed(
            "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n",
        );

        assert_eq!(chunks.len(), 1);
        let chunk = chunks[0].as_ref().unwrap();
        assert_eq!(chunk.delta, "Hello");
        assert!(!chunk.is_final());
    }

    #[test]
    fn test_sse_final_chunk() {
        let mut parser = SseParser::default();
        let chunks = parser
            .feed("event: message_delta\ndata: {\"delta\":{\"stop_reason\":\"end_turn\"}}\n");

        assert_eq!(chunks.len(), 1);
        let chunk = chunks[0].as_ref().unwrap();
        assert!(chunk.is_final());
        assert_eq!(chunk.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn test_sse_split_across_chunks() {
        let mut parser = SseParser::default();

        // First network chunk ends mid-line
        let first = parser.feed("event: content_block_delta\ndata: {\"delta\":{\"te");
        assert!(first.is_empty());

        let second = parser.feed("xt\":\"Hi\"}}\n");
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].as_ref().unwrap().delta, "Hi");
    }

    #[test]
    fn test_sse_multiple_events() {
        let mut parser = SseParser::default();
        let chunks = parser.feed(
            "event: content_block_delta\ndata: {\"delta\":{\"text\":\"Hi\"}}\n\nevent: content_block_delta\ndata: {\"delta\":{\"text\":\" there\"}}\n",
        );

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref().unwrap().delta, "Hi");
        assert_eq!(chunks[1].as_ref().unwrap().delta, " there");
    }

    #[test]
    fn test_sse_error_event() {
        let mut parser = SseParser::default();
        let chunks = parser
            .feed("event: error\ndata: {\"error\":{\"message\":\"overloaded\"}}\n");

        assert_eq!(chunks.len(), 1);
        assert!(matches!(
            chunks[0],
            Err(CompletionError::Unavailable(ref msg)) if msg == "overloaded"
        ));
    }

    #[test]
    fn test_retry_after_default() {
        let error = r#"{"error":{"message":"Rate limit exceeded"}}"#;
        assert_eq!(parse_retry_after(error), 60);
    }

    #[test]
    fn test_retry_after_parsed_from_message() {
        let error = r#"{"error":{"message":"Rate limit exceeded, try again in 12s"}}"#;
        assert_eq!(parse_retry_after(error), 12);
    }
}
