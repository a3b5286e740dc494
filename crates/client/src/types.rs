//! Client Types
//!
//! Wire DTOs for the remote thread API, connection settings, and the client
//! error type.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use threadline_core::{
    ComponentDecision, ContentPart, GenerationStage, Message, MessageRole, ToolSpec,
};

/// Default endpoint of the thread API.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8261/";

// ============================================================================
// Errors
// ============================================================================

/// Errors returned by the remote thread endpoint.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Connection or transport failure
    #[error("Network error: {message}")]
    Network { message: String },

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Rejected credentials (401/403)
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Response body could not be decoded
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Chunk stream broke or carried garbage
    #[error("Stream error: {message}")]
    Stream { message: String },

    /// The configured base URL or a derived route is invalid
    #[error("Invalid URL: {message}")]
    InvalidUrl { message: String },
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::parse(e.to_string())
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Connection settings for `HttpThreadsClient`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    /// Static bearer key forwarded on every request
    pub api_key: Option<String>,
    /// Whole-request timeout; `None` waits indefinitely
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: None,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

// ============================================================================
// Advance request
// ============================================================================

/// What kind of turn a submitted message represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ToolResponse,
}

/// The message submitted with an advance call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub role: MessageRole,
    pub content: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<ActionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<serde_json::Map<String, Value>>,
}

impl OutgoingMessage {
    /// A user turn.
    pub fn user(content: Vec<ContentPart>) -> Self {
        Self {
            role: MessageRole::User,
            content,
            tool_call_id: None,
            error: None,
            is_error: false,
            component: None,
            action_type: None,
            additional_context: None,
        }
    }

    /// The result of a client tool call.
    ///
    /// Failed calls carry the error text both as content and in `error`.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        content: Vec<ContentPart>,
        is_error: bool,
    ) -> Self {
        let error = if is_error {
            Some(
                content
                    .iter()
                    .filter_map(ContentPart::as_text)
                    .collect::<Vec<_>>()
                    .join(""),
            )
        } else {
            None
        };
        Self {
            role: MessageRole::Tool,
            content,
            tool_call_id: Some(tool_call_id.into()),
            error,
            is_error,
            component: None,
            action_type: Some(ActionType::ToolResponse),
            additional_context: None,
        }
    }

    pub fn with_component(mut self, component: Option<ComponentDecision>) -> Self {
        self.component = component;
        self
    }

    pub fn with_additional_context(
        mut self,
        context: Option<serde_json::Map<String, Value>>,
    ) -> Self {
        self.additional_context = context;
        self
    }
}

/// A UI component the model may choose to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableComponent {
    pub name: String,
    pub description: String,
    pub props_definition: Value,
    #[serde(default)]
    pub context_tools: Vec<String>,
}

/// Body of an advance call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceParams {
    pub message_to_append: OutgoingMessage,
    #[serde(default)]
    pub available_components: Vec<AvailableComponent>,
    #[serde(default)]
    pub client_tools: Vec<ToolSpec>,
    /// Calls made so far this turn, per tool name
    #[serde(default)]
    pub tool_call_counts: HashMap<String, u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_tool_choice: Option<String>,
}

impl AdvanceParams {
    pub fn new(message_to_append: OutgoingMessage) -> Self {
        Self {
            message_to_append,
            available_components: Vec::new(),
            client_tools: Vec::new(),
            tool_call_counts: HashMap::new(),
            context_key: None,
            force_tool_choice: None,
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Result of a single-response advance call, and payload of message chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceResponse {
    pub response_message_dto: Message,
    #[serde(default)]
    pub generation_stage: GenerationStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl AdvanceResponse {
    pub fn new(message: Message, generation_stage: GenerationStage) -> Self {
        Self {
            response_message_dto: message,
            generation_stage,
            access_token: None,
        }
    }

    /// Thread the server placed the message on.
    pub fn thread_id(&self) -> &str {
        &self.response_message_dto.thread_id
    }
}

/// One element of an advance stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StreamChunk {
    /// Full snapshot of the in-flight message
    Message(AdvanceResponse),
    ToolCallStart {
        tool_call_id: String,
        tool_name: String,
    },
    ToolCallArgs {
        tool_call_id: String,
        delta: String,
    },
    ToolCallEnd {
        tool_call_id: String,
    },
}

/// Thread metadata as listed or renamed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSummary {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ThreadSummary {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
            context_key: None,
            created_at: Utc::now(),
        }
    }
}
