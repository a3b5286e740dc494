//! Error Handling
//!
//! Unified error type for the Threadline crate.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;
use threadline_client::ClientError;
use threadline_core::GenerationStage;
use threadline_tools::ToolError;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum ThreadlineError {
    /// Transport and remote-service errors
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Tool-call assembly errors (malformed streamed arguments)
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The target thread is still generating
    #[error("Thread {thread_id} is busy ({stage})")]
    Busy {
        thread_id: String,
        stage: GenerationStage,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parse errors (auto-converted from toml::de::Error)
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for Threadline errors
pub type ThreadlineResult<T> = Result<T, ThreadlineError>;

impl ThreadlineError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Convert ThreadlineError to a string for callers that surface plain messages
impl From<ThreadlineError> for String {
    fn from(err: ThreadlineError) -> String {
        err.to_string()
    }
}
