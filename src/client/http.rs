//! HTTP client for a running blogtrace server.

use std::pin::Pin;

use axum::body::Bytes;
use futures::{Stream, StreamExt};
use thiserror::Error;

use crate::core::FlowRequest;

/// Failures while fetching a trace stream.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent.
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("API error: {0}")]
    Status(u16),

    /// The body broke off mid-stream.
    #[error("{0}")]
    Stream(String),
}

/// Raw body chunks of a trace stream.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// Client for the streaming endpoints.
#[derive(Debug, Clone)]
pub struct TraceClient {
    http: reqwest::Client,
    base_url: String,
}

impl TraceClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Endpoint and JSON body for a request.
    fn target(&self, request: &FlowRequest) -> (String, serde_json::Value) {
        match request {
            FlowRequest::Ideas(req) => (
                format!("{}/api/stream", self.base_url),
                serde_json::json!({"tech": req.tech, "targetAudience": req.target_audience}),
            ),
            FlowRequest::Review(req) => (
                format!("{}/api/review", self.base_url),
                serde_json::json!({"content": req.content}),
            ),
        }
    }

    /// Post a request and return its body as a byte stream.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the status is not a success.
    pub async fn open(&self, request: &FlowRequest) -> Result<ByteStream, ClientError> {
        let (url, body) = self.target(request);
        tracing::debug!(url = %url, "opening trace stream");

        let response = self.http.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ClientError::Stream(e.to_string())));

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_follow_flow() {
        let client = TraceClient::new("http://localhost:7890/");

        let (url, body) = client.target(&FlowRequest::ideas("Rust", "上級者"));
        assert_eq!(url, "http://localhost:7890/api/stream");
        assert_eq!(body["targetAudience"], "上級者");

        let (url, body) = client.target(&FlowRequest::review("draft"));
        assert_eq!(url, "http://localhost:7890/api/review");
        assert_eq!(body["content"], "draft");
    }

    #[test]
    fn status_error_message_names_the_code() {
        assert_eq!(ClientError::Status(500).to_string(), "API error: 500");
    }
}
