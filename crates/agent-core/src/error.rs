//! Agent error types.

/// Agent-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// API key not configured.
    #[error("API key not configured")]
    ApiKeyMissing,

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Provider backend could not be built or rejected the request.
    #[error("provider error: {0}")]
    Provider(String),

    /// Failed to parse API response.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Tool execution failed.
    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    /// Invalid agent configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
