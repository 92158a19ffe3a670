//! Trace events: the wire format, step decoding and encoding.

mod encoder;
mod event;
mod log;
mod step;

pub use encoder::TraceEncoder;
pub use event::{TraceEvent, TraceKind};
pub use log::TraceLog;
pub use step::Step;
