//! Threadline Tools
//!
//! Runtime pieces for client-side tool execution:
//! - `KeyedThrottle` - leading/trailing per-key rate limiter
//! - `parse_partial` - best-effort parsing of incomplete JSON
//! - `ToolCallAccumulator` - assembles tool calls from streamed events
//! - `ToolExecutor` - authoritative and speculative tool execution
//!
//! Tool definitions and the registry live in `threadline-core`.

pub mod accumulator;
pub mod error;
pub mod executor;
pub mod partial_json;
pub mod throttle;

pub use accumulator::{PendingToolCall, ToolCallAccumulator};
pub use error::{ToolError, ToolResult};
pub use executor::{default_content, ToolExecutor, ToolResponse, DEFAULT_SPECULATIVE_COOLDOWN};
pub use partial_json::parse_partial;
pub use throttle::{KeyedThrottle, ThrottleCallback};
