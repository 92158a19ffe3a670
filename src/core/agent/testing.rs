//! Providers for driving agents without a network.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use agent_core::{
    CompletionEvent, CompletionRequest, CompletionStream, ContentBlock, LlmProvider, Result,
    StopReason, Usage,
};
use async_trait::async_trait;
use serde_json::json;

use super::WEB_SEARCH_TOOL;

/// Provider that asks for a web search on every call, so a run only ends at
/// its step limit. Each call waits a few milliseconds like a remote model.
#[derive(Debug, Default)]
pub struct SearchLoopProvider {
    calls: AtomicUsize,
}

impl SearchLoopProvider {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Completions requested so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for SearchLoopProvider {
    fn name(&self) -> &'static str {
        "search-loop"
    }

    async fn stream(&self, _request: CompletionRequest) -> Result<CompletionStream> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;

        let id = format!("call_{call}");
        let events = vec![
            CompletionEvent::ToolUseStart {
                index: 0,
                id: id.clone(),
                name: WEB_SEARCH_TOOL.to_string(),
            },
            CompletionEvent::ToolInputDelta {
                index: 0,
                partial_json: format!(r#"{{"query":"round {call}"}}"#),
            },
            CompletionEvent::ContentBlockDone {
                index: 0,
                block: ContentBlock::ToolUse {
                    id,
                    name: WEB_SEARCH_TOOL.to_string(),
                    input: json!({}),
                },
            },
            CompletionEvent::Done {
                stop_reason: Some(StopReason::ToolUse),
                usage: Some(Usage {
                    input_tokens: 1,
                    output_tokens: 1,
                }),
            },
        ];
        Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
    }
}
