//! Thread and Message Types
//!
//! The conversation data model shared by the transport, the tool executor,
//! and the control loop. Field names serialize in camelCase to match the
//! remote thread API.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generation_stage::GenerationStage;

/// Id of the local thread that exists before the server has created one.
pub const PLACEHOLDER_THREAD_ID: &str = "placeholder";

/// Per-message UI state bag.
pub type ComponentStateMap = HashMap<String, Value>;

/// Message role in a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
    System,
}

/// A single content part of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text
    Text { text: String },
    /// Image referenced by URL (or data URL)
    ImageUrl { image_url: ImageUrl },
    /// Embedded resource, e.g. a file the tool produced
    Resource { resource: ResourceContent },
}

impl ContentPart {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Text of this part, if it is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Image URL payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Resource payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A model-issued request to invoke a client-side tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRequest {
    /// Server-issued call id
    pub tool_call_id: String,
    pub tool_name: String,
    /// Parsed argument object
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Value,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// The component the model selected for a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDecision {
    pub component_name: String,
    #[serde(default)]
    pub props: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_request: Option<ToolCallRequest>,
}

/// A message in a thread.
///
/// Immutable by convention: updates produce a new value that replaces the
/// slot with the same `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub content: Vec<ContentPart>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub component_state: ComponentStateMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_request: Option<ToolCallRequest>,
    /// Set on tool-result messages: the call this message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<serde_json::Map<String, Value>>,
}

impl Message {
    /// Create a message with a fresh timestamp and empty state.
    pub fn new(
        id: impl Into<String>,
        thread_id: impl Into<String>,
        role: MessageRole,
        content: Vec<ContentPart>,
    ) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
            role,
            content,
            created_at: Utc::now(),
            component_state: ComponentStateMap::new(),
            component: None,
            tool_call_request: None,
            tool_call_id: None,
            error: None,
            additional_context: None,
        }
    }

    /// The single pending tool call carried by this message, if any.
    ///
    /// The top-level request wins over one nested in the component payload.
    pub fn pending_tool_call(&self) -> Option<&ToolCallRequest> {
        self.tool_call_request.as_ref().or_else(|| {
            self.component
                .as_ref()
                .and_then(|c| c.tool_call_request.as_ref())
        })
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// Whether the message carries no content at all.
    pub fn is_empty(&self) -> bool {
        self.content
            .iter()
            .all(|part| part.as_text().is_some_and(str::is_empty))
    }
}

/// A conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub generation_stage: GenerationStage,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Thread {
    /// Create an empty, idle thread.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            generation_stage: GenerationStage::Idle,
            messages: Vec::new(),
            context_key: None,
            created_at: Utc::now(),
        }
    }

    /// Create the local placeholder thread.
    pub fn placeholder() -> Self {
        Self::new(PLACEHOLDER_THREAD_ID)
    }

    /// Whether this is the local placeholder thread.
    pub fn is_placeholder(&self) -> bool {
        self.id == PLACEHOLDER_THREAD_ID
    }

    /// Look up a message by id.
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Replace the message with the same id in place, or append it.
    ///
    /// Returns `true` when an existing slot was replaced.
    pub fn upsert_message(&mut self, message: Message) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(slot) => {
                *slot = message;
                true
            }
            None => {
                self.messages.push(message);
                false
            }
        }
    }
}
