//! Client side of the trace stream: fetching, line framing, classification.

pub mod http;
pub mod lines;
pub mod session;

use std::sync::Arc;

use agent_core::StreamingAgent;
use axum::body::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::AppState;
use crate::config::Config;
use crate::core::{FlowRequest, respond};

pub use http::{ByteStream, ClientError, TraceClient};
pub use lines::LineDecoder;
pub use session::{ItemId, TraceCategory, TraceItem, TraceSession};

/// Where trace bytes come from.
pub enum TraceSource {
    /// Run the pipeline in this process.
    Local(Arc<dyn StreamingAgent>),
    /// Ask a running server.
    Remote(TraceClient),
}

impl TraceSource {
    /// Pick a source: a server URL when one is given or configured, otherwise
    /// an in-process agent for the request's flow.
    ///
    /// # Errors
    ///
    /// Returns error if no server is set and no provider can be created.
    pub fn resolve(
        config: &Config,
        server: Option<&str>,
        request: &FlowRequest,
    ) -> anyhow::Result<Self> {
        if let Some(url) = server.or(config.client.server_url.as_deref()) {
            return Ok(Self::Remote(TraceClient::new(url)));
        }

        AppState::from_config(config)
            .agent_for(request)
            .map(Self::Local)
            .ok_or_else(|| anyhow::anyhow!("No LLM provider configured"))
    }

    /// Start a request and return the NDJSON body.
    ///
    /// The local source yields the same bytes the server would send.
    ///
    /// # Errors
    ///
    /// Returns error if the remote request fails.
    pub async fn open(&self, request: FlowRequest) -> Result<ByteStream, ClientError> {
        match self {
            Self::Local(agent) => {
                let events = respond(Arc::clone(agent), request);
                Ok(Box::pin(
                    events.map(|event| Ok(Bytes::from(event.to_line()))),
                ))
            }
            Self::Remote(client) => client.open(&request).await,
        }
    }
}

/// Progress of a background fetch.
#[derive(Debug)]
pub enum FetchEvent {
    Chunk(Bytes),
    Done,
    Failed(ClientError),
}

/// Read a request's body on a background task.
///
/// Aborting the returned handle drops the body, which cancels the run.
pub fn spawn_fetch(
    source: TraceSource,
    request: FlowRequest,
) -> (JoinHandle<()>, mpsc::UnboundedReceiver<FetchEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let mut body = match source.open(request).await {
            Ok(body) => body,
            Err(e) => {
                let _ = tx.send(FetchEvent::Failed(e));
                return;
            }
        };

        while let Some(chunk) = body.next().await {
            let event = match chunk {
                Ok(bytes) => FetchEvent::Chunk(bytes),
                Err(e) => {
                    let _ = tx.send(FetchEvent::Failed(e));
                    return;
                }
            };
            if tx.send(event).is_err() {
                return;
            }
        }
        let _ = tx.send(FetchEvent::Done);
    });

    (handle, rx)
}

/// Apply one fetch event to a session.
pub fn apply_fetch(session: &mut TraceSession, event: FetchEvent) {
    match event {
        FetchEvent::Chunk(bytes) => session.feed(&bytes),
        FetchEvent::Done => session.finish(),
        FetchEvent::Failed(e) => session.fail(&e),
    }
}

#[cfg(test)]
mod tests {
    use agent_core::ScriptedAgent;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn local_source_feeds_a_session() {
        let agent = ScriptedAgent::new("ideas")
            .step(json!({"stepType": "initial", "toolCalls": [{"toolName": "Search", "args": {"query": "Q"}}]}))
            .text("答え")
            .usage(3, 4);
        let source = TraceSource::Local(Arc::new(agent));

        let (_handle, mut rx) = spawn_fetch(source, FlowRequest::ideas("Rust", "初心者"));
        let mut session = TraceSession::new();
        session.begin();
        while let Some(event) = rx.recv().await {
            apply_fetch(&mut session, event);
        }

        assert!(!session.is_loading());
        assert_eq!(session.answer(), "答え");
        assert_eq!(session.total_tokens(), Some(7));

        let kinds: Vec<_> = session.items().iter().map(|i| i.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                TraceCategory::SearchStart,
                TraceCategory::Initial,
                TraceCategory::ToolCall,
                TraceCategory::Other,
                TraceCategory::Tokens,
            ]
        );
    }

    #[test]
    fn server_flag_wins_over_local_agent() {
        let mut config = Config::default();
        config.client.server_url = Some("http://config:1".to_string());
        let request = FlowRequest::review("draft");

        let source = TraceSource::resolve(&config, Some("http://flag:2"), &request).unwrap();
        assert!(matches!(source, TraceSource::Remote(_)));
    }
}
