//! LLM provider abstraction and streaming agent contract.
//!
//! Providers turn a [`provider::CompletionRequest`] into a stream of
//! [`provider::CompletionEvent`]s. Agents built on top of them implement
//! [`run::StreamingAgent`], which hands back an [`run::AgentStream`] of text
//! chunks interleaved with step notifications.

pub mod conversation;
pub mod error;
pub mod provider;
pub mod providers;
pub mod run;
pub mod scripted;
pub mod types;

pub use conversation::Conversation;
pub use error::{AgentError, Result};
pub use provider::{CompletionEvent, CompletionRequest, CompletionStream, LlmProvider};
pub use providers::{AnthropicProvider, UnifiedProvider};
pub use run::{
    AgentStream, FinishReason, RunSender, RunSummary, StepCallback, StepPayload, StreamOptions,
    StreamingAgent,
};
pub use scripted::ScriptedAgent;
pub use types::{Content, ContentBlock, Message, Role, StopReason, Tool, Usage};
