//! Runs an agent for one request and turns the run into trace events.

use std::sync::Arc;

use agent_core::{AgentError, StepCallback, StreamOptions, StreamingAgent};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::error::Result;
use super::flow::FlowRequest;
use super::trace::{Step, TraceEncoder, TraceEvent, TraceLog};

/// Ordered trace events of one run. Dropping it cancels the run.
pub type TraceStream = UnboundedReceiverStream<TraceEvent>;

/// Start a streaming run for a validated request.
///
/// The start status is queued before this returns. The run itself happens on
/// a spawned task; the stream ends after the completion status and usage, or
/// after a single error event.
pub fn respond(agent: Arc<dyn StreamingAgent>, request: FlowRequest) -> TraceStream {
    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(TraceEvent::status(request.start_status()));

    tokio::spawn(async move {
        tokio::select! {
            () = tx.closed() => tracing::info!("client disconnected, dropping run"),
            () = pump(agent.as_ref(), request, &tx) => {}
        }
    });

    UnboundedReceiverStream::new(rx)
}

async fn pump(
    agent: &dyn StreamingAgent,
    request: FlowRequest,
    tx: &mpsc::UnboundedSender<TraceEvent>,
) {
    let flow = request.flow();
    let encoder = TraceEncoder::new(flow);

    let steps = tx.clone();
    let on_step: StepCallback = Box::new(move |payload| {
        let step = Step::decode(payload);
        tracing::debug!(?step, "step finished");
        for event in encoder.encode(step) {
            let _ = steps.send(event);
        }
    });

    let options = StreamOptions {
        on_step_finish: Some(on_step),
        metadata: request.metadata(),
    };

    tracing::info!(flow = flow.as_str(), agent = agent.name(), "starting run");

    let mut stream = match agent.stream(request.prompt(), options).await {
        Ok(stream) => stream,
        Err(e) => {
            let _ = tx.send(run_error(&e));
            return;
        }
    };

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(text) => {
                if tx.send(TraceEvent::content(text)).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "run failed mid-stream");
                let _ = tx.send(run_error(&e));
                return;
            }
        }
    }

    let _ = tx.send(TraceEvent::status(flow.literals().completed));

    let total = stream
        .summary()
        .await
        .and_then(|summary| summary.usage)
        .map(|usage| usage.total_tokens());
    if let Some(total) = total {
        let _ = tx.send(TraceEvent::usage(Some(total)));
    }
}

fn run_error(error: &AgentError) -> TraceEvent {
    TraceEvent::error(format!("エージェント実行エラー: {error}"))
}

/// Body returned by the non-streaming generate endpoint.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    /// The full answer.
    pub text: String,
    /// Why the run stopped, e.g. `stop`.
    pub finish_reason: String,
    /// Completion time, RFC 3339.
    pub timestamp: String,
    /// Input plus output tokens, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    /// Human-readable trace lines, in order.
    pub traces: Vec<String>,
}

/// Run a validated request to completion, collecting its trace lines.
///
/// # Errors
///
/// Returns an error if the agent cannot start or fails mid-run.
pub async fn generate(
    agent: Arc<dyn StreamingAgent>,
    request: FlowRequest,
) -> Result<GenerateResponse> {
    let log = TraceLog::new();
    log.push(request.start_status());

    let recorder = log.clone();
    let options = StreamOptions {
        on_step_finish: Some(Box::new(move |payload| {
            recorder.record_step(&Step::decode(payload));
        })),
        metadata: request.metadata(),
    };

    let mut stream = agent.stream(request.prompt(), options).await?;

    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        text.push_str(&chunk?);
    }

    let summary = stream.summary().await;
    let finish_reason = summary
        .map_or_else(|| "unknown".to_string(), |s| s.finish_reason.to_string());
    let total_tokens = summary
        .and_then(|s| s.usage)
        .map(|usage| usage.total_tokens());

    log.push(format!("情報取得完了: {finish_reason}"));
    log.push(format!(
        "合計トークン数: {}",
        total_tokens.map_or_else(|| "N/A".to_string(), |n| n.to_string())
    ));

    Ok(GenerateResponse {
        text,
        finish_reason,
        timestamp: chrono::Utc::now().to_rfc3339(),
        total_tokens,
        traces: log.lines(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use agent_core::{LlmProvider, ScriptedAgent};
    use serde_json::json;

    use super::*;
    use crate::core::agent::testing::SearchLoopProvider;
    use crate::core::agent::{BlogAgent, ToolRegistry};

    async fn collect(agent: ScriptedAgent, request: FlowRequest) -> Vec<TraceEvent> {
        respond(Arc::new(agent), request).collect().await
    }

    #[tokio::test]
    async fn ideas_run_emits_status_steps_content_completion_usage() {
        let agent = ScriptedAgent::new("ideas")
            .step(json!({
                "stepType": "initial",
                "toolCalls": [{"toolName": "Search", "args": {"query": "Q"}}],
            }))
            .text("案1")
            .text("案2")
            .usage(10, 5);

        let events = collect(agent, FlowRequest::ideas("Rust", "")).await;

        assert_eq!(
            events,
            vec![
                TraceEvent::status("検索開始: Rustに関する最新情報を取得します (対象: 初心者)"),
                TraceEvent::initial("エージェントが処理を開始しました", "Search", "Q"),
                TraceEvent::content("案1"),
                TraceEvent::content("案2"),
                TraceEvent::status("出力完了"),
                TraceEvent::usage(Some(15)),
            ]
        );
    }

    #[tokio::test]
    async fn malformed_step_is_reported_and_run_continues() {
        let agent = ScriptedAgent::new("review")
            .raw_step("{broken")
            .text("ok");

        let events = collect(agent, FlowRequest::review("draft")).await;

        assert!(matches!(&events[1], TraceEvent::Error { content } if content.starts_with("トレース処理エラー: ")));
        assert_eq!(events[2], TraceEvent::content("ok"));
        assert_eq!(events[3], TraceEvent::status("レビュー完了"));
    }

    #[tokio::test]
    async fn agent_failure_ends_with_one_error() {
        let agent = ScriptedAgent::new("review").text("partial").fail("boom");

        let events = collect(agent, FlowRequest::review("draft")).await;

        let last = events.last().unwrap();
        assert!(matches!(last, TraceEvent::Error { content } if content.starts_with("エージェント実行エラー: ")));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, TraceEvent::Error { .. }))
                .count(),
            1
        );
        assert!(!events.contains(&TraceEvent::status("レビュー完了")));
    }

    #[tokio::test]
    async fn refused_run_emits_status_then_error() {
        let agent = ScriptedAgent::new("review").refuse("no key");

        let events = collect(agent, FlowRequest::review("draft")).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], TraceEvent::Status { .. }));
        assert!(matches!(events[1], TraceEvent::Error { .. }));
    }

    #[tokio::test]
    async fn dropping_the_stream_stops_provider_calls() {
        let provider = SearchLoopProvider::new();
        let agent = BlogAgent::ideas(
            Arc::clone(&provider) as Arc<dyn LlmProvider>,
            "model",
            ToolRegistry::new(),
        )
        .with_max_steps(1000);

        let mut events = respond(Arc::new(agent), FlowRequest::ideas("Rust", ""));
        assert!(matches!(events.next().await, Some(TraceEvent::Status { .. })));
        assert!(matches!(events.next().await, Some(TraceEvent::Trace { .. })));
        drop(events);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let stopped_at = provider.calls();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(provider.calls(), stopped_at);
        assert!(stopped_at < 1000);
    }

    #[tokio::test]
    async fn generate_collects_text_and_traces() {
        let agent = ScriptedAgent::new("ideas")
            .step(json!({
                "stepType": "initial",
                "toolCalls": [{"toolName": "brave_web_search", "args": {"query": "Rust"}}],
                "toolResults": [{"result": {"content": [{"type": "text", "text": "結果"}]}}],
            }))
            .step(json!({"stepType": "tool-result"}))
            .text("まとめ")
            .usage(3, 4);

        let response = generate(Arc::new(agent), FlowRequest::ideas("Rust", "上級者"))
            .await
            .unwrap();

        assert_eq!(response.text, "まとめ");
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.total_tokens, Some(7));
        assert_eq!(
            response.traces,
            vec![
                "検索開始: Rustに関する最新情報を取得します (対象: 上級者)".to_string(),
                r#"ツール使用: brave_web_search - {"query":"Rust"}"#.to_string(),
                "ツール結果: 結果".to_string(),
                "検索完了".to_string(),
                "情報取得完了: stop".to_string(),
                "合計トークン数: 7".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn generate_without_usage_reports_not_available() {
        let agent = ScriptedAgent::new("ideas").text("x");

        let response = generate(Arc::new(agent), FlowRequest::ideas("Go", ""))
            .await
            .unwrap();

        assert_eq!(response.total_tokens, None);
        assert_eq!(response.traces.last().unwrap(), "合計トークン数: N/A");
    }
}
