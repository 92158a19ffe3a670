//! Human-readable trace lines collected for a single non-streaming run.

use std::sync::Arc;

use parking_lot::Mutex;

use super::step::Step;

const RESULT_PREVIEW_CHARS: usize = 100;
const STEP_PREVIEW_CHARS: usize = 150;

/// Trace lines for one request.
///
/// Each request creates its own log and hands clones of it to the step
/// callback, so concurrent runs never see each other's lines.
#[derive(Debug, Clone, Default)]
pub struct TraceLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl TraceLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line.
    pub fn push(&self, line: impl Into<String>) {
        self.lines.lock().push(line.into());
    }

    /// Append the lines describing one step.
    pub fn record_step(&self, step: &Step) {
        match step {
            Step::Initial {
                tool_name,
                args,
                tool_results_text,
                text,
                ..
            } => {
                let name = tool_name.as_deref().unwrap_or("Unknown Tool");
                let args = args
                    .as_ref()
                    .map_or_else(|| "{}".to_string(), ToString::to_string);
                self.push(format!("ツール使用: {name} - {args}"));

                if let Some(result) = tool_results_text {
                    self.push(format!(
                        "ツール結果: {}",
                        preview(result, RESULT_PREVIEW_CHARS)
                    ));
                }
                self.record_observation(text.as_deref());
            }
            Step::Reasoning { details, text } => {
                let joined = details.join(" ");
                let content = if joined.is_empty() {
                    text.as_deref().unwrap_or_default()
                } else {
                    &joined
                };
                self.push(format!("推論: {content}"));
            }
            Step::ToolResult { text } => {
                self.push("検索完了");
                self.record_observation(text.as_deref());
            }
            Step::Thinking { text, .. } => {
                if let Some(text) = text {
                    self.push(format!("思考中: {}", preview(text, RESULT_PREVIEW_CHARS)));
                }
            }
            Step::Other { step_type, raw, .. } => {
                let json: String = raw.to_string().chars().take(STEP_PREVIEW_CHARS).collect();
                self.push(format!(
                    "ステップ({}): {json}...",
                    step_type.as_deref().unwrap_or("unknown")
                ));
            }
            Step::Malformed { reason } => self.push(format!("トレース処理エラー: {reason}")),
        }
    }

    /// The model's own output for a step.
    fn record_observation(&self, text: Option<&str>) {
        if let Some(text) = text {
            self.push(format!("観察: {}", preview(text, RESULT_PREVIEW_CHARS)));
        }
    }

    /// Snapshot of the lines so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

/// First `max` characters, with `...` appended when anything was cut.
fn preview(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
