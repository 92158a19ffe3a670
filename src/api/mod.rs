//! HTTP API server for blogtrace.

// Allow clippy lint triggered by utoipa's OpenApi derive macro
#![allow(clippy::needless_for_each)]

use std::convert::Infallible;
use std::sync::Arc;

use agent_core::StreamingAgent;
use axum::{
    Json, Router,
    body::Body,
    extract::{FromRequest, Request, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::config::Config;
use crate::core::agent::{BlogAgent, ToolRegistry};
use crate::core::flow::{IdeaRequest, ReviewRequest};
use crate::core::{FlowRequest, GenerateResponse, TraceStream, responder};

/// Shared application state. Immutable once the server starts.
#[derive(Clone, Default)]
pub struct AppState {
    /// Agent for the ideas flow, if a provider is configured.
    pub ideas: Option<Arc<dyn StreamingAgent>>,

    /// Agent for the review flow, if a provider is configured.
    pub review: Option<Arc<dyn StreamingAgent>>,
}

impl AppState {
    /// Build both agents from configuration.
    ///
    /// A provider that cannot be created leaves both agents unset; requests
    /// then fail with 503 instead of the server refusing to start.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let provider = match config.agent.create_provider() {
            Ok(provider) => provider,
            Err(e) => {
                tracing::warn!(error = %e, "no LLM provider available");
                return Self::default();
            }
        };

        let tools = config.search.client().map_or_else(
            || {
                tracing::warn!(
                    env = %config.search.api_key_env,
                    "web search disabled, token not set"
                );
                ToolRegistry::new()
            },
            ToolRegistry::with_search,
        );

        let settings = &config.agent;
        let ideas = BlogAgent::ideas(Arc::clone(&provider), &settings.model, tools)
            .with_max_tokens(settings.max_tokens)
            .with_max_steps(settings.max_steps)
            .with_thinking_budget(settings.thinking_budget);
        let review = BlogAgent::review(provider, &settings.model)
            .with_max_tokens(settings.max_tokens)
            .with_max_steps(settings.max_steps)
            .with_thinking_budget(settings.thinking_budget);

        Self {
            ideas: Some(Arc::new(ideas)),
            review: Some(Arc::new(review)),
        }
    }

    /// The agent that serves a request's flow.
    #[must_use]
    pub fn agent_for(&self, request: &FlowRequest) -> Option<Arc<dyn StreamingAgent>> {
        match request {
            FlowRequest::Ideas(_) => self.ideas.clone(),
            FlowRequest::Review(_) => self.review.clone(),
        }
    }
}

type SharedState = Arc<AppState>;

/// `OpenAPI` documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "blogtrace API",
        description = "Streams the intermediate steps of blog idea and review agents",
        version = "0.1.0",
        license(name = "MIT")
    ),
    paths(health, stream_ideas, stream_review, generate),
    components(schemas(IdeaRequest, ReviewRequest, GenerateResponse, ErrorBody))
)]
struct ApiDoc;

/// Error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// What went wrong.
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// JSON body extractor whose rejections use the API's error body.
///
/// Malformed or mistyped bodies are client errors like any failed
/// validation, so they answer 400 with `{"error": ...}`.
struct ApiJson<T>(T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection.body_text(), "rejected request body");
                Err(api_error(StatusCode::BAD_REQUEST, rejection.body_text()))
            }
        }
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/openapi.json", get(openapi))
        .route("/api/stream", post(stream_ideas))
        .route("/api/review", post(stream_review))
        .route("/api/generate", post(generate))
        .with_state(Arc::new(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP API server.
///
/// # Errors
///
/// Returns an error if the server fails to bind or start.
pub async fn serve(config: &Config, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::from_config(config);
    let ready = state.ideas.is_some();
    let app = router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    if ready {
        tracing::info!(addr = %addr, "starting HTTP API server");
    } else {
        tracing::warn!(addr = %addr, "starting HTTP API server without an agent, runs will return 503");
    }

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service healthy", body = String))
)]
async fn health() -> &'static str {
    "ok"
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Validate, pick the agent, and start a run.
fn start(state: &AppState, request: FlowRequest) -> Result<TraceStream, ApiError> {
    request
        .validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let agent = state.agent_for(&request).ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "No LLM provider configured",
        )
    })?;

    Ok(responder::respond(agent, request))
}

/// Wrap a trace stream as an NDJSON response.
fn ndjson(events: TraceStream) -> Response {
    let body = Body::from_stream(events.map(|event| Ok::<_, Infallible>(event.to_line())));

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response()
}

/// Stream blog ideas for a technology.
#[utoipa::path(
    post,
    path = "/api/stream",
    request_body = IdeaRequest,
    responses(
        (status = 200, description = "NDJSON trace stream", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Tech is required", body = ErrorBody),
        (status = 503, description = "No LLM provider configured", body = ErrorBody)
    )
)]
async fn stream_ideas(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<IdeaRequest>,
) -> Result<Response, ApiError> {
    let request = FlowRequest::ideas(req.tech, req.target_audience);
    start(&state, request).map(ndjson)
}

/// Stream a review of a blog draft.
#[utoipa::path(
    post,
    path = "/api/review",
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "NDJSON trace stream", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Content is required", body = ErrorBody),
        (status = 503, description = "No LLM provider configured", body = ErrorBody)
    )
)]
async fn stream_review(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<ReviewRequest>,
) -> Result<Response, ApiError> {
    start(&state, FlowRequest::Review(req)).map(ndjson)
}

/// Generate blog ideas without streaming.
#[utoipa::path(
    post,
    path = "/api/generate",
    request_body = IdeaRequest,
    responses(
        (status = 200, description = "Finished run", body = GenerateResponse),
        (status = 400, description = "Tech is required", body = ErrorBody),
        (status = 500, description = "Agent run failed", body = ErrorBody),
        (status = 503, description = "No LLM provider configured", body = ErrorBody)
    )
)]
async fn generate(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<IdeaRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let request = FlowRequest::ideas(req.tech, req.target_audience);
    request
        .validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let agent = state.agent_for(&request).ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "No LLM provider configured",
        )
    })?;

    responder::generate(agent, request)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!(error = %e, "generate failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })
}
