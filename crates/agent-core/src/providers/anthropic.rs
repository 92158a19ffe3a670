//! Anthropic Messages API provider.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::error::{AgentError, Result};
use crate::provider::{CompletionEvent, CompletionRequest, CompletionStream, LlmProvider};
use crate::types::{ContentBlock, Delta, MessagesRequest, StreamEvent, ThinkingConfig, Usage};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Anthropic (Claude) LLM provider.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    http: reqwest::Client,
    api_key: String,
    url: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    ///
    /// # Errors
    ///
    /// Returns error if API key is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(AgentError::ApiKeyMissing);
        }

        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            url: API_URL.to_string(),
        })
    }

    /// Point the provider at a compatible endpoint (gateway or proxy).
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.url = format!("{}/v1/messages", base_url.trim_end_matches('/'));
        self
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key).map_err(|_| AgentError::ApiKeyMissing)?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));

        let body = MessagesRequest {
            model: request.model,
            max_tokens: request.max_tokens,
            messages: request.messages,
            system: request.system,
            tools: request.tools,
            thinking: request.thinking_budget.map(ThinkingConfig::enabled),
            stream: true,
        };

        let response = self
            .http
            .post(&self.url)
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AgentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let byte_stream = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer = SseBuffer::default();
            let mut blocks: Vec<ContentBlock> = Vec::new();
            let mut usage = Usage::default();

            futures::pin_mut!(byte_stream);

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(AgentError::from(e));
                        return;
                    }
                };
                buffer.push(&chunk);

                while let Some(event) = buffer.next_event() {
                    let Some(event) = event else {
                        continue;
                    };

                    match event {
                        StreamEvent::MessageStart { message } => {
                            usage.accumulate(message.usage);
                        }

                        StreamEvent::ContentBlockStart { index, content_block } => {
                            while blocks.len() <= index {
                                blocks.push(ContentBlock::Text { text: String::new() });
                            }
                            blocks[index] = content_block.clone();

                            if let ContentBlock::ToolUse { id, name, .. } = content_block {
                                yield Ok(CompletionEvent::ToolUseStart { index, id, name });
                            }
                        }

                        StreamEvent::ContentBlockDelta { index, delta } => match delta {
                            Delta::TextDelta { text } => {
                                if let Some(ContentBlock::Text { text: t }) = blocks.get_mut(index) {
                                    t.push_str(&text);
                                }
                                yield Ok(CompletionEvent::TextDelta(text));
                            }
                            Delta::InputJsonDelta { partial_json } => {
                                yield Ok(CompletionEvent::ToolInputDelta { index, partial_json });
                            }
                            Delta::ThinkingDelta { thinking } => {
                                if let Some(ContentBlock::Thinking { thinking: t, .. }) = blocks.get_mut(index) {
                                    t.push_str(&thinking);
                                }
                                yield Ok(CompletionEvent::ThinkingDelta(thinking));
                            }
                            Delta::SignatureDelta { signature } => {
                                if let Some(ContentBlock::Thinking { signature: s, .. }) = blocks.get_mut(index) {
                                    s.push_str(&signature);
                                }
                            }
                        },

                        StreamEvent::ContentBlockStop { index } => {
                            if let Some(block) = blocks.get(index).cloned() {
                                yield Ok(CompletionEvent::ContentBlockDone { index, block });
                            }
                        }

                        StreamEvent::MessageDelta { delta, usage: delta_usage } => {
                            usage.accumulate(delta_usage);
                            yield Ok(CompletionEvent::Done {
                                stop_reason: delta.stop_reason,
                                usage: Some(usage),
                            });
                        }

                        StreamEvent::Error { error } => {
                            yield Ok(CompletionEvent::Error(error.message));
                        }

                        StreamEvent::MessageStop | StreamEvent::Ping => {}
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Raw SSE bytes awaiting a complete event.
///
/// Events are decoded only once their terminating blank line has arrived, so
/// multi-byte characters split across network chunks stay intact.
#[derive(Debug, Default)]
struct SseBuffer {
    bytes: Vec<u8>,
}

impl SseBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Take the next complete event off the buffer.
    ///
    /// Returns `None` when no complete event is buffered yet, and `Some(None)`
    /// for a complete event that carries nothing this provider understands.
    fn next_event(&mut self) -> Option<Option<StreamEvent>> {
        let end = self.bytes.windows(2).position(|w| w == b"\n\n")?;
        let raw: Vec<u8> = self.bytes.drain(..end + 2).collect();
        Some(parse_sse_event(&String::from_utf8_lossy(&raw[..end])))
    }
}

/// Parse the text of one SSE event, without its terminating blank line.
fn parse_sse_event(event: &str) -> Option<StreamEvent> {
    let data = event
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .last()?;

    match serde_json::from_str::<StreamEvent>(data) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(data = %data, error = %e, "failed to parse event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_requires_api_key() {
        let result = AnthropicProvider::new("");
        assert!(matches!(result, Err(AgentError::ApiKeyMissing)));
    }

    #[test]
    fn base_url_override_targets_messages_endpoint() {
        let provider = AnthropicProvider::new("test-key")
            .unwrap()
            .with_base_url("http://localhost:8080/");
        assert_eq!(provider.url, "http://localhost:8080/v1/messages");
    }

    #[test]
    fn buffer_waits_for_complete_event() {
        let mut buffer = SseBuffer::default();
        buffer.push(b"event: ping\ndata: {\"type\":\"ping\"}");
        assert!(buffer.next_event().is_none());

        buffer.push(b"\n\n");
        assert!(matches!(buffer.next_event(), Some(Some(StreamEvent::Ping))));
        assert!(buffer.next_event().is_none());
    }

    #[test]
    fn buffer_extracts_thinking_delta() {
        let mut buffer = SseBuffer::default();
        buffer.push("event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"thinking_delta\",\"thinking\":\"まず検索\"}}\n\nrest".as_bytes());

        match buffer.next_event() {
            Some(Some(StreamEvent::ContentBlockDelta {
                index: 0,
                delta: Delta::ThinkingDelta { thinking },
            })) => assert_eq!(thinking, "まず検索"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(buffer.bytes, b"rest");
    }

    #[test]
    fn text_split_inside_a_character_is_decoded_whole() {
        let event = "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"検索完了\"}}\n\n";
        let bytes = event.as_bytes();
        let split = event.find('検').unwrap() + 1;

        let mut buffer = SseBuffer::default();
        buffer.push(&bytes[..split]);
        assert!(buffer.next_event().is_none());
        buffer.push(&bytes[split..]);

        match buffer.next_event() {
            Some(Some(StreamEvent::ContentBlockDelta {
                delta: Delta::TextDelta { text },
                ..
            })) => assert_eq!(text, "検索完了"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn buffer_skips_unknown_payloads() {
        let mut buffer = SseBuffer::default();
        buffer.push(b"data: {\"type\":\"something_new\"}\n\n");
        assert!(matches!(buffer.next_event(), Some(None)));
        assert!(buffer.bytes.is_empty());
    }
}
