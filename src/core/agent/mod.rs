//! Tool-using blog agent.
//!
//! One run drives a provider through at most `max_steps` completions. Text is
//! forwarded as it streams; each completed step is reported as a JSON step
//! notification carrying the tool calls and tool results of that step.

pub mod instructions;
#[cfg(test)]
pub(crate) mod testing;
mod tools;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use agent_core::{
    AgentStream, ContentBlock, Conversation, CompletionEvent, CompletionRequest, FinishReason,
    LlmProvider, Result, RunSender, RunSummary, StepPayload, StopReason, StreamOptions,
    StreamingAgent, Usage,
};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};
use tracing::Instrument;

pub use tools::{ToolRegistry, WEB_SEARCH_TOOL};

const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_MAX_STEPS: usize = 5;

/// How extended thinking is reported in step notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThinkingStep {
    /// A `reasoning` step with `reasoningDetails`.
    #[default]
    Reasoning,
    /// A `thinking` step with `text`.
    Thinking,
}

/// Agent that answers one prompt with an LLM and optional tools.
#[derive(Clone)]
pub struct BlogAgent {
    name: String,
    instructions: String,
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    max_steps: usize,
    thinking_budget: Option<u32>,
    thinking_step: ThinkingStep,
    tools: Arc<ToolRegistry>,
}

impl std::fmt::Debug for BlogAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlogAgent")
            .field("name", &self.name)
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("max_steps", &self.max_steps)
            .finish_non_exhaustive()
    }
}

impl BlogAgent {
    /// Create an agent with a system prompt and no tools.
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            provider,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_steps: DEFAULT_MAX_STEPS,
            thinking_budget: None,
            thinking_step: ThinkingStep::default(),
            tools: Arc::new(ToolRegistry::new()),
        }
    }

    /// The blog idea agent, searching the web with `tools`.
    pub fn ideas(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        tools: ToolRegistry,
    ) -> Self {
        Self::new("Blog Idea Agent", instructions::IDEAS, provider, model).with_tools(tools)
    }

    /// The blog review agent.
    pub fn review(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self::new("Blog Review Agent", instructions::REVIEW, provider, model)
            .with_thinking_step(ThinkingStep::Thinking)
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Limit the number of completions per run. Zero is treated as one.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    #[must_use]
    pub const fn with_thinking_budget(mut self, budget: Option<u32>) -> Self {
        self.thinking_budget = budget;
        self
    }

    #[must_use]
    pub const fn with_thinking_step(mut self, style: ThinkingStep) -> Self {
        self.thinking_step = style;
        self
    }

    #[must_use]
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    fn run(&self) -> Run {
        Run {
            provider: Arc::clone(&self.provider),
            tools: Arc::clone(&self.tools),
            conversation: Conversation::with_system(self.instructions.clone()),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            max_steps: self.max_steps,
            thinking_budget: self.thinking_budget,
            thinking_step: self.thinking_step,
        }
    }
}

#[async_trait]
impl StreamingAgent for BlogAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, prompt: String, options: StreamOptions) -> Result<AgentStream> {
        let (tx, stream) = AgentStream::channel(options.on_step_finish);
        let run = self.run();

        let span = tracing::info_span!(
            "agent_run",
            agent = %self.name,
            model = %self.model,
            query = tracing::field::Empty,
            target_audience = tracing::field::Empty,
            session_id = tracing::field::Empty,
            content_length = tracing::field::Empty,
        );
        record_metadata(&span, &options.metadata);

        tokio::spawn(
            async move {
                let outcome = tokio::select! {
                    () = tx.closed() => None,
                    result = run.execute(prompt, &tx) => Some(result),
                };

                match outcome {
                    None => tracing::info!("consumer went away, run stopped"),
                    Some(Ok(summary)) => {
                        tracing::info!(finish_reason = %summary.finish_reason, "run finished");
                        tx.finish(summary);
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "run failed");
                        tx.fail(e);
                    }
                }
            }
            .instrument(span),
        );

        Ok(stream)
    }
}

fn record_metadata(span: &tracing::Span, metadata: &serde_json::Map<String, Value>) {
    for (key, field) in [
        ("query", "query"),
        ("targetAudience", "target_audience"),
        ("sessionId", "session_id"),
    ] {
        if let Some(value) = metadata.get(key).and_then(Value::as_str) {
            span.record(field, value);
        }
    }
    if let Some(length) = metadata.get("contentLength").and_then(Value::as_u64) {
        span.record("content_length", length);
    }
}

/// State owned by one run.
struct Run {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    conversation: Conversation,
    model: String,
    max_tokens: u32,
    max_steps: usize,
    thinking_budget: Option<u32>,
    thinking_step: ThinkingStep,
}

/// One tool call and its outcome.
struct ToolOutcome {
    id: String,
    name: String,
    args: Value,
    output: String,
    is_error: bool,
}

/// What one completion produced.
#[derive(Default)]
struct Turn {
    blocks: Vec<ContentBlock>,
    text: String,
    thinking: String,
    stop_reason: Option<StopReason>,
    usage: Option<Usage>,
}

impl Turn {
    fn tool_calls(&self) -> impl Iterator<Item = (&String, &String, &Value)> {
        self.blocks.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some((id, name, input)),
            _ => None,
        })
    }
}

impl Run {
    async fn execute(mut self, prompt: String, tx: &RunSender) -> Result<RunSummary> {
        self.conversation.add_user_message(prompt);

        let mut usage: Option<Usage> = None;

        for index in 0..self.max_steps {
            let turn = self.stream_turn(tx).await?;
            tracing::debug!(step = index, stop_reason = ?turn.stop_reason, "completion done");

            if let Some(u) = turn.usage {
                usage.get_or_insert_with(Usage::default).accumulate(u);
            }

            if !turn.blocks.is_empty() {
                self.conversation.add_assistant_blocks(turn.blocks.clone());
            }

            let wants_tools = turn.stop_reason == Some(StopReason::ToolUse);
            let outcomes = if wants_tools {
                self.run_tools(&turn).await
            } else {
                Vec::new()
            };

            if !turn.thinking.is_empty() {
                tx.step(StepPayload::Value(self.thinking_payload(&turn.thinking)));
            }

            let finish_reason = finish_reason(turn.stop_reason);
            tx.step(StepPayload::Value(step_payload(
                index,
                &turn,
                &outcomes,
                finish_reason,
            )));

            if !wants_tools {
                return Ok(RunSummary {
                    finish_reason,
                    usage,
                });
            }

            self.conversation.add_tool_results(
                outcomes
                    .into_iter()
                    .map(|o| ContentBlock::ToolResult {
                        tool_use_id: o.id,
                        content: o.output,
                        is_error: o.is_error.then_some(true),
                    })
                    .collect(),
            );
        }

        tracing::info!(max_steps = self.max_steps, "step limit reached");
        Ok(RunSummary {
            finish_reason: FinishReason::ToolCalls,
            usage,
        })
    }

    async fn stream_turn(&self, tx: &RunSender) -> Result<Turn> {
        let tools = self.tools.definitions();
        let request = CompletionRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: self.conversation.messages().to_vec(),
            system: self.conversation.system().map(String::from),
            tools: (!tools.is_empty()).then_some(tools),
            thinking_budget: self.thinking_budget,
        };

        let stream = self.provider.stream(request).await?;
        futures::pin_mut!(stream);

        let mut turn = Turn::default();
        let mut blocks: BTreeMap<usize, ContentBlock> = BTreeMap::new();
        let mut tool_inputs: HashMap<usize, String> = HashMap::new();

        while let Some(event) = stream.next().await {
            match event? {
                CompletionEvent::TextDelta(text) => {
                    turn.text.push_str(&text);
                    tx.text(text);
                }
                CompletionEvent::ThinkingDelta(thinking) => turn.thinking.push_str(&thinking),
                CompletionEvent::ToolUseStart { index, id, name } => {
                    blocks.insert(
                        index,
                        ContentBlock::ToolUse {
                            id,
                            name,
                            input: Value::Null,
                        },
                    );
                }
                CompletionEvent::ToolInputDelta {
                    index,
                    partial_json,
                } => {
                    tool_inputs.entry(index).or_default().push_str(&partial_json);
                }
                CompletionEvent::ContentBlockDone { index, block } => {
                    let block = match block {
                        ContentBlock::ToolUse { id, name, input } => {
                            let input = tool_inputs
                                .remove(&index)
                                .and_then(|json| serde_json::from_str(&json).ok())
                                .unwrap_or(input);
                            ContentBlock::ToolUse { id, name, input }
                        }
                        other => other,
                    };
                    blocks.insert(index, block);
                }
                CompletionEvent::Done { stop_reason, usage } => {
                    turn.stop_reason = stop_reason;
                    if usage.is_some() {
                        turn.usage = usage;
                    }
                }
                CompletionEvent::Error(message) => {
                    return Err(agent_core::AgentError::Api { status: 0, message });
                }
            }
        }

        turn.blocks = blocks
            .into_values()
            .filter(|block| !matches!(block, ContentBlock::Text { text } if text.is_empty()))
            .collect();

        Ok(turn)
    }

    async fn run_tools(&self, turn: &Turn) -> Vec<ToolOutcome> {
        let mut outcomes = Vec::new();

        for (id, name, input) in turn.tool_calls() {
            let (output, is_error) = match self.tools.execute(name, input.clone()).await {
                Ok(output) => (output, false),
                Err(e) => {
                    tracing::warn!(tool = %name, error = %e, "tool failed");
                    (e.to_string(), true)
                }
            };

            outcomes.push(ToolOutcome {
                id: id.clone(),
                name: name.clone(),
                args: input.clone(),
                output,
                is_error,
            });
        }

        outcomes
    }

    fn thinking_payload(&self, thinking: &str) -> Value {
        match self.thinking_step {
            ThinkingStep::Reasoning => json!({
                "stepType": "reasoning",
                "reasoningDetails": [{"type": "text", "text": thinking}],
                "text": thinking,
            }),
            ThinkingStep::Thinking => json!({
                "stepType": "thinking",
                "text": thinking,
            }),
        }
    }
}

const fn finish_reason(stop_reason: Option<StopReason>) -> FinishReason {
    match stop_reason {
        Some(StopReason::EndTurn | StopReason::StopSequence) => FinishReason::Stop,
        Some(StopReason::MaxTokens) => FinishReason::Length,
        Some(StopReason::ToolUse) => FinishReason::ToolCalls,
        None => FinishReason::Unknown,
    }
}

/// The step notification for one completed step.
fn step_payload(
    index: usize,
    turn: &Turn,
    outcomes: &[ToolOutcome],
    finish_reason: FinishReason,
) -> Value {
    let step_type = if index == 0 { "initial" } else { "tool-result" };

    let tool_calls: Vec<Value> = turn
        .tool_calls()
        .map(|(id, name, args)| json!({"toolCallId": id, "toolName": name, "args": args}))
        .collect();

    let tool_results: Vec<Value> = outcomes
        .iter()
        .map(|o| {
            json!({
                "toolCallId": o.id,
                "toolName": o.name,
                "args": o.args,
                "result": {"content": [{"type": "text", "text": o.output}]},
                "isError": o.is_error,
            })
        })
        .collect();

    let mut payload = json!({
        "stepType": step_type,
        "text": turn.text,
        "toolCalls": tool_calls,
        "toolResults": tool_results,
        "finishReason": finish_reason,
    });

    if let Some(usage) = turn.usage {
        payload["usage"] = json!({
            "promptTokens": usage.input_tokens,
            "completionTokens": usage.output_tokens,
            "totalTokens": usage.total_tokens(),
        });
    }

    payload
}
