//! Turns decoded steps into wire events.

use super::event::{TraceEvent, TraceKind};
use super::step::Step;
use crate::core::flow::{Flow, FlowLiterals};

/// Encodes steps for one flow.
#[derive(Debug, Clone, Copy)]
pub struct TraceEncoder {
    literals: &'static FlowLiterals,
}

impl TraceEncoder {
    #[must_use]
    pub const fn new(flow: Flow) -> Self {
        Self {
            literals: flow.literals(),
        }
    }

    /// Zero or more events for one step, in emission order.
    #[must_use]
    pub fn encode(&self, step: Step) -> Vec<TraceEvent> {
        let lit = self.literals;

        match step {
            Step::Initial {
                tool_name,
                query,
                tool_results_text,
                ..
            } => {
                let mut events = vec![TraceEvent::initial(
                    lit.initial,
                    tool_name.unwrap_or_else(|| lit.no_tool.to_string()),
                    query.unwrap_or_else(|| lit.no_query.to_string()),
                )];
                if let Some(text) = tool_results_text {
                    events.push(TraceEvent::tool_results_data(text));
                }
                events
            }

            Step::Reasoning { details, text } => {
                let joined = details.join(" ");
                let content = if joined.is_empty() {
                    text.unwrap_or_default()
                } else {
                    joined
                };
                vec![TraceEvent::trace(TraceKind::Reasoning, content)]
            }

            Step::ToolResult { .. } => vec![TraceEvent::trace(TraceKind::ToolResult, lit.tool_result)],

            Step::Thinking { text, raw } => {
                if lit.thinking_steps {
                    let content = format!("思考中: {}", text.unwrap_or_default());
                    vec![TraceEvent::trace(TraceKind::Thinking, content)]
                } else {
                    vec![TraceEvent::trace(
                        TraceKind::Thinking,
                        text.unwrap_or_else(|| raw.to_string()),
                    )]
                }
            }

            Step::Other {
                step_type,
                text,
                raw,
            } => {
                let kind = step_type.map_or_else(TraceKind::default, TraceKind::from);
                vec![TraceEvent::trace(kind, text.unwrap_or_else(|| raw.to_string()))]
            }

            Step::Malformed { reason } => {
                tracing::warn!(error = %reason, "malformed step notification");
                vec![TraceEvent::error(format!("トレース処理エラー: {reason}"))]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use agent_core::StepPayload;
    use serde_json::json;

    use super::*;

    fn encode(flow: Flow, value: serde_json::Value) -> Vec<TraceEvent> {
        TraceEncoder::new(flow).encode(Step::decode(StepPayload::Value(value)))
    }

    #[test]
    fn initial_with_tool_call_yields_one_trace() {
        let events = encode(
            Flow::Ideas,
            json!({
                "stepType": "initial",
                "toolCalls": [{"toolName": "Search", "args": {"query": "Q"}}],
            }),
        );

        assert_eq!(
            events,
            vec![TraceEvent::initial(
                "エージェントが処理を開始しました",
                "Search",
                "Q"
            )]
        );
    }

    #[test]
    fn initial_with_tool_result_appends_results_data() {
        let events = encode(
            Flow::Ideas,
            json!({
                "stepType": "initial",
                "toolCalls": [{"toolName": "Search", "args": {"query": "Q"}}],
                "toolResults": [{"result": {"content": [{"text": "X"}]}}],
            }),
        );

        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            TraceEvent::Trace { trace_type: TraceKind::Initial, .. }
        ));
        assert_eq!(events[1], TraceEvent::tool_results_data("X"));
    }

    #[test]
    fn initial_without_tool_uses_flow_placeholders() {
        let ideas = encode(Flow::Ideas, json!({"stepType": "initial"}));
        assert_eq!(
            ideas[0],
            TraceEvent::initial(
                "エージェントが処理を開始しました",
                "Unknown Tool",
                "Unknown Query"
            )
        );

        let review = encode(Flow::Review, json!({"stepType": "initial"}));
        assert_eq!(
            review[0],
            TraceEvent::initial("エージェントが記事の分析を開始しました", "No Tool", "No Query")
        );
    }

    #[test]
    fn reasoning_falls_back_from_details_to_text_to_empty() {
        let joined = encode(
            Flow::Ideas,
            json!({"stepType": "reasoning", "reasoningDetails": ["a", "b"], "text": "t"}),
        );
        assert_eq!(joined, vec![TraceEvent::trace(TraceKind::Reasoning, "a b")]);

        let text = encode(
            Flow::Ideas,
            json!({"stepType": "reasoning", "reasoningDetails": [], "text": "t"}),
        );
        assert_eq!(text, vec![TraceEvent::trace(TraceKind::Reasoning, "t")]);

        let empty = encode(Flow::Ideas, json!({"stepType": "reasoning"}));
        assert_eq!(empty, vec![TraceEvent::trace(TraceKind::Reasoning, "")]);
    }

    #[test]
    fn tool_result_discards_payload_for_flow_literal() {
        let ideas = encode(Flow::Ideas, json!({"stepType": "tool-result", "text": "ignored"}));
        assert_eq!(ideas, vec![TraceEvent::trace(TraceKind::ToolResult, "検索完了")]);

        let review = encode(Flow::Review, json!({"stepType": "tool-result"}));
        assert_eq!(review, vec![TraceEvent::trace(TraceKind::ToolResult, "分析完了")]);
    }

    #[test]
    fn thinking_is_prefixed_only_in_review() {
        let review = encode(Flow::Review, json!({"stepType": "thinking", "text": "構成"}));
        assert_eq!(
            review,
            vec![TraceEvent::trace(TraceKind::Thinking, "思考中: 構成")]
        );

        let ideas = encode(Flow::Ideas, json!({"stepType": "thinking", "text": "構成"}));
        assert_eq!(ideas, vec![TraceEvent::trace(TraceKind::Thinking, "構成")]);
    }

    #[test]
    fn other_steps_fall_back_to_serialized_payload() {
        let events = encode(Flow::Ideas, json!({"stepType": "continue"}));
        assert_eq!(
            events,
            vec![TraceEvent::trace(
                TraceKind::Other("continue".to_string()),
                r#"{"stepType":"continue"}"#
            )]
        );

        let untyped = encode(Flow::Review, json!({"text": "hello"}));
        assert_eq!(
            untyped,
            vec![TraceEvent::trace(TraceKind::Other("unknown".to_string()), "hello")]
        );
    }

    #[test]
    fn malformed_payload_becomes_error_event() {
        let events = TraceEncoder::new(Flow::Review)
            .encode(Step::decode(StepPayload::Json("{oops".to_string())));

        assert_eq!(events.len(), 1);
        match &events[0] {
            TraceEvent::Error { content } => assert!(content.starts_with("トレース処理エラー: ")),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
