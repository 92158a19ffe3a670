//! Agent that replays a fixed run.

use async_trait::async_trait;

use crate::error::{AgentError, Result};
use crate::run::{AgentStream, FinishReason, RunSummary, StepPayload, StreamOptions, StreamingAgent};
use crate::types::Usage;

#[derive(Debug, Clone)]
enum Beat {
    Step(StepPayload),
    Text(String),
    Fail(String),
}

/// A [`StreamingAgent`] that replays scripted steps and text.
///
/// Each call to [`StreamingAgent::stream`] replays the whole script from the
/// start, which makes it suitable for exercising consumers without a provider.
#[derive(Debug, Clone)]
pub struct ScriptedAgent {
    name: String,
    beats: Vec<Beat>,
    usage: Option<Usage>,
    refuse: Option<String>,
}

impl ScriptedAgent {
    /// Create an empty script.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            beats: Vec::new(),
            usage: None,
            refuse: None,
        }
    }

    /// Append a step notification given as a JSON value.
    #[must_use]
    pub fn step(mut self, value: serde_json::Value) -> Self {
        self.beats.push(Beat::Step(StepPayload::Value(value)));
        self
    }

    /// Append a step notification given as raw JSON text.
    #[must_use]
    pub fn raw_step(mut self, json: impl Into<String>) -> Self {
        self.beats.push(Beat::Step(StepPayload::Json(json.into())));
        self
    }

    /// Append a text chunk.
    #[must_use]
    pub fn text(mut self, chunk: impl Into<String>) -> Self {
        self.beats.push(Beat::Text(chunk.into()));
        self
    }

    /// Fail the run at this point.
    #[must_use]
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.beats.push(Beat::Fail(message.into()));
        self
    }

    /// Report usage in the run summary.
    #[must_use]
    pub const fn usage(mut self, input_tokens: u32, output_tokens: u32) -> Self {
        self.usage = Some(Usage {
            input_tokens,
            output_tokens,
        });
        self
    }

    /// Refuse to start, as a provider without credentials would.
    #[must_use]
    pub fn refuse(mut self, message: impl Into<String>) -> Self {
        self.refuse = Some(message.into());
        self
    }
}

#[async_trait]
impl StreamingAgent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, _prompt: String, options: StreamOptions) -> Result<AgentStream> {
        if let Some(message) = &self.refuse {
            return Err(AgentError::Config(message.clone()));
        }

        let (tx, stream) = AgentStream::channel(options.on_step_finish);
        let beats = self.beats.clone();
        let usage = self.usage;

        tokio::spawn(async move {
            for beat in beats {
                let delivered = match beat {
                    Beat::Step(payload) => tx.step(payload),
                    Beat::Text(chunk) => tx.text(chunk),
                    Beat::Fail(message) => {
                        tx.fail(AgentError::Provider(message));
                        return;
                    }
                };
                if !delivered {
                    return;
                }
                tokio::task::yield_now().await;
            }

            tx.finish(RunSummary {
                finish_reason: FinishReason::Stop,
                usage,
            });
        });

        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn replays_text_and_usage() {
        let agent = ScriptedAgent::new("demo").text("a").text("b").usage(10, 5);

        let mut stream = agent
            .stream("prompt".to_string(), StreamOptions::default())
            .await
            .unwrap();

        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            text.push_str(&chunk.unwrap());
        }

        assert_eq!(text, "ab");
        let summary = stream.summary().await.unwrap();
        assert_eq!(summary.usage.map(|u| u.total_tokens()), Some(15));
    }

    #[tokio::test]
    async fn refusing_agent_never_starts() {
        let agent = ScriptedAgent::new("demo").refuse("no key");
        let result = agent
            .stream("prompt".to_string(), StreamOptions::default())
            .await;
        assert!(matches!(result, Err(AgentError::Config(_))));
    }
}
