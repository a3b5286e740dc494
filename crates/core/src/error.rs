//! Core Error Types
//!
//! The error a tool reports back from `Tool::execute`. It is
//! dependency-light (only thiserror + serde_json) so the client and tools
//! crates can share it without pulling in a runtime.
//!
//! Tool errors never abort an exchange: the executor turns them into error
//! tool results whose text is the error's display string.

use thiserror::Error;

/// Core error type for the Threadline workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Tool arguments did not match the expected shape
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A tool callback reported a failure
    #[error("{0}")]
    Tool(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a tool failure. The message is surfaced verbatim to the model.
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }
}
