//! Decoding of step notifications into a closed set of variants.

use agent_core::StepPayload;
use serde_json::Value;

/// A step notification, classified.
///
/// Decoding never fails: unknown shapes become [`Step::Other`] and payloads
/// that are not valid JSON become [`Step::Malformed`].
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The first step of a run.
    Initial {
        tool_name: Option<String>,
        query: Option<String>,
        args: Option<Value>,
        tool_results_text: Option<String>,
        text: Option<String>,
    },
    /// A reasoning step.
    Reasoning {
        details: Vec<String>,
        text: Option<String>,
    },
    /// A step that followed tool results.
    ToolResult { text: Option<String> },
    /// A thinking step.
    Thinking { text: Option<String>, raw: Value },
    /// Any other step type, or none at all.
    Other {
        step_type: Option<String>,
        text: Option<String>,
        raw: Value,
    },
    /// The payload was not valid JSON.
    Malformed { reason: String },
}

impl Step {
    /// Classify a step payload.
    #[must_use]
    pub fn decode(payload: StepPayload) -> Self {
        let value = match payload {
            StepPayload::Value(value) => value,
            StepPayload::Json(text) => match serde_json::from_str::<Value>(&text) {
                Ok(value) => value,
                Err(e) => {
                    return Self::Malformed {
                        reason: e.to_string(),
                    };
                }
            },
        };

        let text = value.get("text").and_then(present);
        let step_type = value.get("stepType").and_then(present);

        match step_type.as_deref() {
            Some("initial") => Self::Initial {
                tool_name: value.pointer("/toolCalls/0/toolName").and_then(present),
                query: value.pointer("/toolCalls/0/args/query").and_then(present),
                args: value.pointer("/toolCalls/0/args").cloned(),
                tool_results_text: value
                    .pointer("/toolResults/0/result/content/0/text")
                    .and_then(present),
                text,
            },
            Some("reasoning") => Self::Reasoning {
                details: value
                    .get("reasoningDetails")
                    .and_then(Value::as_array)
                    .map(|items| items.iter().map(detail_text).collect())
                    .unwrap_or_default(),
                text,
            },
            Some("tool-result") => Self::ToolResult { text },
            Some("thinking") => Self::Thinking { text, raw: value },
            _ => Self::Other {
                step_type,
                text,
                raw: value,
            },
        }
    }
}

/// A value that counts as present: non-empty strings, numbers, `true`, and
/// any array or object. Non-string values are rendered as JSON.
fn present(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn detail_text(detail: &Value) -> String {
    match detail {
        Value::String(s) => s.clone(),
        other => other
            .get("text")
            .and_then(Value::as_str)
            .map_or_else(|| other.to_string(), str::to_string),
    }
}
