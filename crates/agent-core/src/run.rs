//! The contract between an agent run and whoever consumes it.
//!
//! An agent hands back an [`AgentStream`] of text chunks. Step notifications
//! travel on the same channel as the text, and the registered
//! [`StepCallback`] fires while the stream is polled, so a consumer observes
//! steps and text in exactly the order the agent produced them.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::error::{AgentError, Result};
use crate::types::Usage;

/// Opaque per-step notification.
///
/// Agents may hand over a JSON document as text or as an already-parsed
/// value; consumers decode either form.
#[derive(Debug, Clone, PartialEq)]
pub enum StepPayload {
    /// Serialized JSON, possibly malformed.
    Json(String),
    /// Pre-parsed JSON value.
    Value(serde_json::Value),
}

/// Callback invoked once per finished step.
pub type StepCallback = Box<dyn FnMut(StepPayload) + Send>;

/// Options for a single streaming run.
#[derive(Default)]
pub struct StreamOptions {
    /// Called for each finished step, in order with the text chunks.
    pub on_step_finish: Option<StepCallback>,

    /// Free-form metadata recorded alongside the run.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamOptions")
            .field("on_step_finish", &self.on_step_finish.is_some())
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    /// The model finished its answer.
    Stop,
    /// The model hit its output token limit.
    Length,
    /// The model asked for tools but the step limit was reached.
    ToolCalls,
    /// The provider gave no reason.
    Unknown,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool-calls",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Final outcome of a run, available once the text stream is drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub finish_reason: FinishReason,
    pub usage: Option<Usage>,
}

enum Signal {
    Step(StepPayload),
    Text(String),
}

/// Producer half of an [`AgentStream`], held by the running agent.
#[derive(Debug)]
pub struct RunSender {
    signals: mpsc::UnboundedSender<Result<Signal>>,
    summary: Option<oneshot::Sender<RunSummary>>,
}

impl RunSender {
    /// Report a finished step. Returns `false` once the consumer is gone.
    pub fn step(&self, payload: StepPayload) -> bool {
        self.signals.send(Ok(Signal::Step(payload))).is_ok()
    }

    /// Send a text chunk. Returns `false` once the consumer is gone.
    pub fn text(&self, chunk: impl Into<String>) -> bool {
        self.signals.send(Ok(Signal::Text(chunk.into()))).is_ok()
    }

    /// Surface an error to the consumer and end the run.
    pub fn fail(self, error: AgentError) {
        let _ = self.signals.send(Err(error));
    }

    /// Record the run summary and end the run.
    pub fn finish(mut self, summary: RunSummary) {
        if let Some(tx) = self.summary.take() {
            let _ = tx.send(summary);
        }
    }

    /// Resolves when the consumer drops its [`AgentStream`].
    pub async fn closed(&self) {
        self.signals.closed().await;
    }

    /// Whether the consumer has dropped its [`AgentStream`].
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.signals.is_closed()
    }
}

/// Consumer half of a run: a stream of text chunks.
///
/// Step notifications interleaved with the text are delivered to the
/// `on_step_finish` callback as the stream is polled. Dropping the stream
/// signals the agent to stop.
pub struct AgentStream {
    signals: mpsc::UnboundedReceiver<Result<Signal>>,
    summary: oneshot::Receiver<RunSummary>,
    on_step: Option<StepCallback>,
}

impl fmt::Debug for AgentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentStream").finish_non_exhaustive()
    }
}

impl AgentStream {
    /// Create a connected sender and stream pair.
    #[must_use]
    pub fn channel(on_step: Option<StepCallback>) -> (RunSender, Self) {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (summary_tx, summary_rx) = oneshot::channel();

        let sender = RunSender {
            signals: signal_tx,
            summary: Some(summary_tx),
        };
        let stream = Self {
            signals: signal_rx,
            summary: summary_rx,
            on_step,
        };

        (sender, stream)
    }

    /// Wait for the run summary.
    ///
    /// Returns `None` if the run ended without one (error or cancellation).
    pub async fn summary(self) -> Option<RunSummary> {
        self.summary.await.ok()
    }
}

impl Stream for AgentStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            match this.signals.poll_recv(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Ready(Some(Ok(Signal::Step(payload)))) => {
                    if let Some(on_step) = this.on_step.as_mut() {
                        on_step(payload);
                    }
                }
                Poll::Ready(Some(Ok(Signal::Text(chunk)))) => {
                    return Poll::Ready(Some(Ok(chunk)));
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
            }
        }
    }
}

/// An agent that answers a prompt with a stream of text and step notifications.
#[async_trait]
pub trait StreamingAgent: Send + Sync {
    /// Agent display name.
    fn name(&self) -> &str;

    /// Start a run. The run proceeds in the background until the returned
    /// stream is drained or dropped.
    async fn stream(&self, prompt: String, options: StreamOptions) -> Result<AgentStream>;
}
