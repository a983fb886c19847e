//! Streaming HTTP client for the provider
//!
//! Opens chat completions with `stream: true` and decodes the body as a
//! sequence of `data:` lines terminated by a `[DONE]` sentinel. The client
//! holds the API key; it never travels past this module. Dropping a
//! `ChatStream` closes the upstream connection, which is how cancellation
//! propagates.

use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use thiserror::Error;

use super::types::{
    ApiErrorPayload, CatalogModel, CatalogResponse, ChatRequest, StreamChunk, StreamEvent,
};
use crate::core::config::OpenRouterConfig;
use crate::core::constants::UPSTREAM_CONNECT_TIMEOUT_SECS;

/// How much of an upstream error body is kept for diagnostics
const ERROR_BODY_MAX: usize = 512;

#[derive(Error, Debug)]
pub enum OpenRouterError {
    #[error("OpenRouter API key is not configured")]
    MissingApiKey,

    #[error("OpenRouter returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("OpenRouter stream error: {message}")]
    Api { code: Option<i64>, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode stream chunk: {0}")]
    Decode(String),
}

/// Provider HTTP client
pub struct OpenRouterClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    http_referer: String,
    x_title: String,
}

impl OpenRouterClient {
    /// Build a client. There is no overall request timeout by design;
    /// streams may legitimately last minutes.
    pub fn new(config: &OpenRouterConfig) -> Result<Self, OpenRouterError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(UPSTREAM_CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http_referer: config.http_referer.clone(),
            x_title: config.x_title.clone(),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str, OpenRouterError> {
        self.api_key.as_deref().ok_or(OpenRouterError::MissingApiKey)
    }

    /// Open a streaming chat completion
    pub async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream, OpenRouterError> {
        let key = self.api_key()?;

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .header("HTTP-Referer", &self.http_referer)
            .header("X-Title", &self.x_title)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = body.chars().take(ERROR_BODY_MAX).collect();
            return Err(OpenRouterError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(ChatStream::new(response.bytes_stream()))
    }

    /// Fetch the model catalog for sync
    pub async fn list_models(&self) -> Result<Vec<CatalogModel>, OpenRouterError> {
        let key = self.api_key()?;

        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .bearer_auth(key)
            .header("HTTP-Referer", &self.http_referer)
            .header("X-Title", &self.x_title)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = body.chars().take(ERROR_BODY_MAX).collect();
            return Err(OpenRouterError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let catalog: CatalogResponse = response.json().await?;
        Ok(catalog.data)
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<bytes::Bytes>> + Send>>;

/// Decoder over the streaming response body
///
/// Network chunks do not align with lines, so bytes accumulate in a buffer
/// and complete lines are drained as they appear.
pub struct ChatStream {
    inner: ByteStream,
    buf: String,
    finished: bool,
}

impl ChatStream {
    fn new(stream: impl Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(stream),
            buf: String::new(),
            finished: false,
        }
    }

    /// Next decoded event; None once the body is exhausted or the `[DONE]`
    /// sentinel has been seen
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent, OpenRouterError>> {
        loop {
            // Drain complete lines already buffered
            while let Some(pos) = self.buf.find('\n') {
                let line: String = self.buf.drain(..=pos).collect();
                match decode_line(line.trim_end_matches(['\n', '\r'])) {
                    Some(Ok(StreamEvent::Done)) => {
                        self.finished = true;
                        return Some(Ok(StreamEvent::Done));
                    }
                    Some(event) => return Some(event),
                    None => {}
                }
            }

            if self.finished {
                return None;
            }

            match self.inner.next().await {
                Some(Ok(bytes)) => {
                    self.buf.push_str(&String::from_utf8_lossy(&bytes));
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(OpenRouterError::Transport(e)));
                }
                None => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }
}

/// Decode one body line. Returns None for blanks, SSE comments, and chunks
/// carrying neither text nor usage.
fn decode_line(line: &str) -> Option<Result<StreamEvent, OpenRouterError>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        // Keep-alive comments such as ": OPENROUTER PROCESSING"
        return None;
    }

    let payload = line.strip_prefix("data:")?.trim();
    if payload == "[DONE]" {
        return Some(Ok(StreamEvent::Done));
    }

    // Providers stream errors in-band as {"error": {...}}
    if let Ok(err) = serde_json::from_str::<ApiErrorPayload>(payload) {
        return Some(Err(OpenRouterError::Api {
            code: err.error.code,
            message: err.error.message,
        }));
    }

    let chunk: StreamChunk = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(e) => return Some(Err(OpenRouterError::Decode(e.to_string()))),
    };

    let text = chunk
        .choices
        .first()
        .and_then(|c| c.delta.content.clone())
        .unwrap_or_default();

    if text.is_empty() && chunk.usage.is_none() {
        return None;
    }

    Some(Ok(StreamEvent::Delta {
        text,
        usage: chunk.usage,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(line: &str) -> (String, Option<super::super::types::UsageCounts>) {
        match decode_line(line) {
            Some(Ok(StreamEvent::Delta { text, usage })) => (text, usage),
            other => panic!("expected delta, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_text_delta() {
        let (text, usage) =
            delta("data: {\"choices\":[{\"delta\":{\"content\":\" hello\"}}]}");
        assert_eq!(text, " hello");
        assert!(usage.is_none());
    }

    #[test]
    fn test_decode_usage_only_chunk() {
        let (text, usage) = delta(
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":2,\"total_tokens\":5}}",
        );
        assert_eq!(text, "");
        let usage = usage.unwrap();
        assert_eq!(usage.prompt_tokens, 3);
        assert_eq!(usage.total_tokens, 5);
    }

    #[test]
    fn test_decode_done_sentinel() {
        assert!(matches!(
            decode_line("data: [DONE]"),
            Some(Ok(StreamEvent::Done))
        ));
    }

    #[test]
    fn test_decode_skips_comments_and_blanks() {
        assert!(decode_line(": OPENROUTER PROCESSING").is_none());
        assert!(decode_line("").is_none());
        assert!(decode_line("event: something").is_none());
    }

    #[test]
    fn test_decode_empty_delta_is_skipped() {
        assert!(decode_line("data: {\"choices\":[{\"delta\":{}}]}").is_none());
    }

    #[test]
    fn test_decode_inband_error() {
        let result = decode_line("data: {\"error\":{\"message\":\"overloaded\",\"code\":502}}");
        match result {
            Some(Err(OpenRouterError::Api { code, message })) => {
                assert_eq!(code, Some(502));
                assert_eq!(message, "overloaded");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        assert!(matches!(
            decode_line("data: {not json"),
            Some(Err(OpenRouterError::Decode(_)))
        ));
    }

    #[tokio::test]
    async fn test_stream_reassembles_split_lines() {
        let chunks: Vec<reqwest::Result<bytes::Bytes>> = vec![
            Ok(bytes::Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"He\"}}")),
            Ok(bytes::Bytes::from_static(b"]}\ndata: {\"choices\":[{\"delta\":{\"content\":\"llo\"}}]}\n")),
            Ok(bytes::Bytes::from_static(b"data: [DONE]\n")),
        ];
        let mut stream = ChatStream::new(futures::stream::iter(chunks));

        let mut text = String::new();
        loop {
            match stream.next_event().await {
                Some(Ok(StreamEvent::Delta { text: piece, .. })) => text.push_str(&piece),
                Some(Ok(StreamEvent::Done)) => break,
                Some(Err(e)) => panic!("unexpected error: {e}"),
                None => break,
            }
        }
        assert_eq!(text, "Hello");
        assert!(stream.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_eof_without_sentinel() {
        let chunks: Vec<reqwest::Result<bytes::Bytes>> = vec![Ok(bytes::Bytes::from_static(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n",
        ))];
        let mut stream = ChatStream::new(futures::stream::iter(chunks));

        assert!(matches!(
            stream.next_event().await,
            Some(Ok(StreamEvent::Delta { .. }))
        ));
        assert!(stream.next_event().await.is_none());
    }

    #[test]
    fn test_missing_api_key_error() {
        let client = OpenRouterClient::new(&OpenRouterConfig {
            api_key: None,
            base_url: "https://example.invalid/api/v1".to_string(),
            http_referer: "http://localhost".to_string(),
            x_title: "test".to_string(),
        })
        .unwrap();

        assert!(!client.has_api_key());
        assert!(matches!(
            client.api_key(),
            Err(OpenRouterError::MissingApiKey)
        ));
    }
}
