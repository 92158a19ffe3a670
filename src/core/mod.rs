//! Core logic shared by the HTTP API and the CLI.

pub mod agent;
mod error;
pub mod flow;
pub mod responder;
pub mod search;
pub mod trace;

pub use agent::BlogAgent;
pub use error::{Error, Result};
pub use flow::{Flow, FlowRequest};
pub use responder::{GenerateResponse, TraceStream, generate, respond};
pub use trace::{TraceEvent, TraceKind};
