//! Tool-call Error Types

use thiserror::Error;

/// Errors raised while assembling tool calls from a stream.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The concatenated argument fragments are not valid JSON.
    #[error("Malformed arguments for tool call {tool_call_id} ({tool_name}): {source}")]
    MalformedArguments {
        tool_call_id: String,
        tool_name: String,
        #[source]
        source: serde_json::Error,
    },

    /// An args/end event referenced a call id that was never started.
    #[error("Unknown tool call: {0}")]
    UnknownToolCall(String),

    /// A start event reused a call id that is still tracked.
    #[error("Duplicate tool call: {0}")]
    DuplicateToolCall(String),

    /// An args/end event arrived after the call was finalized.
    #[error("Tool call already finalized: {0}")]
    AlreadyFinalized(String),
}

/// Result type alias for tool-call errors
pub type ToolResult<T> = Result<T, ToolError>;

impl ToolError {
    /// Call id the error refers to.
    pub fn tool_call_id(&self) -> &str {
        match self {
            ToolError::MalformedArguments { tool_call_id, .. } => tool_call_id,
            ToolError::UnknownToolCall(id)
            | ToolError::DuplicateToolCall(id)
            | ToolError::AlreadyFinalized(id) => id,
        }
    }
}
