//! Provider implementations.

mod anthropic;
mod unified;

pub use anthropic::AnthropicProvider;
pub use unified::UnifiedProvider;
