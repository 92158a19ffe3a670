//! Error types for the core module.

use agent_core::AgentError;

/// Core error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A request failed validation before reaching the agent.
    #[error("{0}")]
    Validation(String),

    /// The agent could not be started or failed mid-run.
    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
