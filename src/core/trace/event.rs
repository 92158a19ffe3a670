//! Wire records of the trace stream.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sub-kind of a `trace` event.
///
/// Serialized as the bare `traceType` string. Step types this crate does
/// not know about are carried verbatim in [`TraceKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TraceKind {
    /// First step of a run, with the tool it called.
    Initial,
    /// Full text returned by the first tool call.
    ToolResultsData,
    /// A step that followed tool results.
    ToolResult,
    /// Model reasoning.
    Reasoning,
    /// Model thinking (review flow).
    Thinking,
    /// Any other step type.
    Other(String),
}

impl TraceKind {
    /// The `traceType` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Initial => "initial",
            Self::ToolResultsData => "tool-results-data",
            Self::ToolResult => "tool-result",
            Self::Reasoning => "reasoning",
            Self::Thinking => "thinking",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for TraceKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "initial" => Self::Initial,
            "tool-results-data" => Self::ToolResultsData,
            "tool-result" => Self::ToolResult,
            "reasoning" => Self::Reasoning,
            "thinking" => Self::Thinking,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for TraceKind {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<TraceKind> for String {
    fn from(kind: TraceKind) -> Self {
        match kind {
            TraceKind::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl Default for TraceKind {
    fn default() -> Self {
        Self::Other("unknown".to_string())
    }
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One NDJSON record of the trace stream.
///
/// Records are emitted in order and never change after emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum TraceEvent {
    /// Progress line for the user.
    Status {
        #[serde(default)]
        content: String,
    },

    /// An agent step.
    Trace {
        #[serde(default)]
        trace_type: TraceKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_results_text: Option<String>,
    },

    /// A chunk of the answer text.
    Content {
        #[serde(default)]
        content: String,
    },

    /// Token usage for the whole run.
    Usage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_tokens: Option<u64>,
    },

    /// A failure, either of one step or of the whole run.
    Error {
        #[serde(default)]
        content: String,
    },
}

impl TraceEvent {
    #[must_use]
    pub fn status(content: impl Into<String>) -> Self {
        Self::Status {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn content(content: impl Into<String>) -> Self {
        Self::Content {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn error(content: impl Into<String>) -> Self {
        Self::Error {
            content: content.into(),
        }
    }

    #[must_use]
    pub const fn usage(total_tokens: Option<u64>) -> Self {
        Self::Usage { total_tokens }
    }

    /// A trace carrying only content.
    #[must_use]
    pub fn trace(kind: TraceKind, content: impl Into<String>) -> Self {
        Self::Trace {
            trace_type: kind,
            content: Some(content.into()),
            tool_name: None,
            query: None,
            tool_results_text: None,
        }
    }

    /// The `initial` trace with the first tool call.
    #[must_use]
    pub fn initial(
        content: impl Into<String>,
        tool_name: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self::Trace {
            trace_type: TraceKind::Initial,
            content: Some(content.into()),
            tool_name: Some(tool_name.into()),
            query: Some(query.into()),
            tool_results_text: None,
        }
    }

    /// The `tool-results-data` trace with the untruncated tool output.
    #[must_use]
    pub fn tool_results_data(text: impl Into<String>) -> Self {
        Self::Trace {
            trace_type: TraceKind::ToolResultsData,
            content: None,
            tool_name: None,
            query: None,
            tool_results_text: Some(text.into()),
        }
    }

    /// Serialize as one NDJSON line, newline included.
    #[must_use]
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }
}
