//! blogtrace: blog idea and review agents whose intermediate steps stream
//! to the client as NDJSON trace events.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  ┌─────────────┐  ┌─────────────┐
//! │     CLI     │  │  TUI/plain  │  │   HTTP API  │
//! └──────┬──────┘  └──────┬──────┘  └──────┬──────┘
//!        │                │                │
//!        │         ┌──────┴──────┐         │
//!        │         │   Client    │         │
//!        │         └──────┬──────┘         │
//!        └────────────────┼────────────────┘
//!                         │
//!                  ┌──────┴──────┐
//!                  │    Core     │
//!                  └─────────────┘
//! ```
//!
//! Core runs an agent for a request and encodes its steps as trace events.
//! The client classifies those events into display items, whether they come
//! from a server or from an in-process run.

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod core;
pub mod tui;

pub use config::Config;
