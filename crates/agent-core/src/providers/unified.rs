//! Multi-backend provider built on the `llm` crate.
//!
//! Covers `OpenAI` (and compatible gateways), Google, Groq and Mistral.

use async_trait::async_trait;
use futures::StreamExt;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::{ChatMessage, FunctionTool, StreamChunk, Tool as LlmTool};
use llm::{FunctionCall, LLMProvider, ToolCall as LlmToolCall};

use crate::error::{AgentError, Result};
use crate::provider::{CompletionEvent, CompletionRequest, CompletionStream, LlmProvider};
use crate::types::{Content, ContentBlock, Message, Role, StopReason, Tool};

/// Provider backed by one of the `llm` crate's backends.
///
/// The backend client is built per request because model, system prompt and
/// token limit live on the builder rather than on the chat call.
pub struct UnifiedProvider {
    backend: fn() -> LLMBackend,
    api_key: Option<String>,
    base_url: Option<String>,
    name: &'static str,
}

impl std::fmt::Debug for UnifiedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifiedProvider")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl UnifiedProvider {
    fn keyed(backend: fn() -> LLMBackend, name: &'static str, api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(AgentError::ApiKeyMissing);
        }

        Ok(Self {
            backend,
            api_key: Some(api_key),
            base_url: None,
            name,
        })
    }

    /// `OpenAI` or any Chat Completions compatible endpoint.
    ///
    /// Local gateways such as Ollama need no key, so both are optional.
    #[must_use]
    pub fn openai(api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            backend: || LLMBackend::OpenAI,
            api_key,
            base_url,
            name: "openai",
        }
    }

    /// Google Gemini.
    pub fn google(api_key: impl Into<String>) -> Result<Self> {
        Self::keyed(|| LLMBackend::Google, "google", api_key.into())
    }

    /// Groq.
    pub fn groq(api_key: impl Into<String>) -> Result<Self> {
        Self::keyed(|| LLMBackend::Groq, "groq", api_key.into())
    }

    /// Mistral.
    pub fn mistral(api_key: impl Into<String>) -> Result<Self> {
        Self::keyed(|| LLMBackend::Mistral, "mistral", api_key.into())
    }

    fn build(&self, request: &CompletionRequest) -> Result<Box<dyn LLMProvider>> {
        let mut builder = LLMBuilder::new()
            .backend((self.backend)())
            .model(request.model.clone())
            .max_tokens(request.max_tokens);

        if let Some(key) = &self.api_key {
            builder = builder.api_key(key.clone());
        }
        if let Some(url) = &self.base_url {
            builder = builder.base_url(url.clone());
        }
        if let Some(system) = &request.system {
            builder = builder.system(system.clone());
        }

        builder
            .build()
            .map_err(|e| AgentError::Provider(e.to_string()))
    }
}

/// Convert our messages to the llm crate format.
fn convert_messages(messages: &[Message]) -> Vec<ChatMessage> {
    let mut result = Vec::new();

    for msg in messages {
        match &msg.content {
            Content::Text(text) => result.push(chat_message(msg.role, text.clone())),
            Content::Blocks(blocks) => {
                let mut text_parts = Vec::new();
                let mut tool_uses = Vec::new();
                let mut tool_results = Vec::new();

                for block in blocks {
                    match block {
                        ContentBlock::Text { text } => text_parts.push(text.as_str()),
                        // Only Anthropic replays thinking blocks.
                        ContentBlock::Thinking { .. } => {}
                        ContentBlock::ToolUse { id, name, input } => {
                            tool_uses.push(LlmToolCall {
                                id: id.clone(),
                                call_type: "function".to_string(),
                                function: FunctionCall {
                                    name: name.clone(),
                                    arguments: input.to_string(),
                                },
                            });
                        }
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            is_error,
                        } => {
                            let name = if is_error.unwrap_or(false) { "error" } else { "result" };
                            tool_results.push(LlmToolCall {
                                id: tool_use_id.clone(),
                                call_type: "function".to_string(),
                                function: FunctionCall {
                                    name: name.to_string(),
                                    arguments: content.clone(),
                                },
                            });
                        }
                    }
                }

                let text = text_parts.concat();
                if !tool_uses.is_empty() {
                    result.push(
                        ChatMessage::assistant()
                            .content(text)
                            .tool_use(tool_uses)
                            .build(),
                    );
                } else if !text.is_empty() {
                    result.push(chat_message(msg.role, text));
                }

                if !tool_results.is_empty() {
                    result.push(ChatMessage::user().tool_result(tool_results).build());
                }
            }
        }
    }

    result
}

fn chat_message(role: Role, text: String) -> ChatMessage {
    match role {
        Role::User => ChatMessage::user().content(text).build(),
        Role::Assistant => ChatMessage::assistant().content(text).build(),
    }
}

/// Convert our tools to llm crate format.
fn convert_tools(tools: &[Tool]) -> Vec<LlmTool> {
    tools
        .iter()
        .map(|t| LlmTool {
            tool_type: "function".to_string(),
            function: FunctionTool {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.input_schema.clone(),
            },
            cache_control: None,
        })
        .collect()
}

fn map_stop_reason(reason: &str) -> Option<StopReason> {
    match reason {
        "end_turn" | "stop" => Some(StopReason::EndTurn),
        "tool_use" | "tool_calls" => Some(StopReason::ToolUse),
        "max_tokens" | "length" => Some(StopReason::MaxTokens),
        "stop_sequence" => Some(StopReason::StopSequence),
        _ => None,
    }
}

#[async_trait]
impl LlmProvider for UnifiedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        let client = self.build(&request)?;
        let messages = convert_messages(&request.messages);
        let tools = request.tools.as_deref().map(convert_tools);

        let chunks = client
            .chat_stream_with_tools(&messages, tools.as_deref())
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        let stream = async_stream::stream! {
            // The text block sits at index 0; tool calls follow it.
            let mut text = String::new();

            futures::pin_mut!(chunks);

            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(StreamChunk::Text(delta)) => {
                        text.push_str(&delta);
                        yield Ok(CompletionEvent::TextDelta(delta));
                    }
                    Ok(StreamChunk::ToolUseStart { index, id, name }) => {
                        yield Ok(CompletionEvent::ToolUseStart { index: index + 1, id, name });
                    }
                    Ok(StreamChunk::ToolUseInputDelta { index, partial_json }) => {
                        yield Ok(CompletionEvent::ToolInputDelta { index: index + 1, partial_json });
                    }
                    Ok(StreamChunk::ToolUseComplete { index, tool_call }) => {
                        let input = serde_json::from_str(&tool_call.function.arguments)
                            .unwrap_or(serde_json::Value::Null);
                        yield Ok(CompletionEvent::ContentBlockDone {
                            index: index + 1,
                            block: ContentBlock::ToolUse {
                                id: tool_call.id,
                                name: tool_call.function.name,
                                input,
                            },
                        });
                    }
                    Ok(StreamChunk::Done { stop_reason }) => {
                        if !text.is_empty() {
                            yield Ok(CompletionEvent::ContentBlockDone {
                                index: 0,
                                block: ContentBlock::Text { text: std::mem::take(&mut text) },
                            });
                        }

                        yield Ok(CompletionEvent::Done {
                            stop_reason: map_stop_reason(&stop_reason),
                            usage: None,
                        });
                    }
                    Err(e) => {
                        yield Ok(CompletionEvent::Error(e.to_string()));
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
