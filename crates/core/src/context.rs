//! Context Hierarchy
//!
//! Explicit, request-scoped context objects that are threaded through every
//! control-loop, tool, and component-state call:
//!
//! 1. `ExecutionContext` trait - read-only identity shared by all scopes
//! 2. `MessageContext` - "which message of which thread am I part of"
//! 3. `ToolCallContext` - a message context plus the tool call being executed
//!
//! Nothing in the workspace looks these up from global or thread-local state;
//! whoever starts the work constructs the context and passes it down.

use serde::{Deserialize, Serialize};

// ============================================================================
// ExecutionContext Trait
// ============================================================================

/// Base execution context providing the thread/message a piece of work
/// belongs to.
pub trait ExecutionContext: Send + Sync {
    /// Returns the thread identifier.
    fn thread_id(&self) -> &str;

    /// Returns the message identifier this work is scoped to.
    fn message_id(&self) -> &str;
}

// ============================================================================
// MessageContext
// ============================================================================

/// Context for state scoped to a single message (component state, rendering).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageContext {
    thread_id: String,
    message_id: String,
}

impl MessageContext {
    /// Create a new MessageContext.
    pub fn new(thread_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            message_id: message_id.into(),
        }
    }

    /// Derive a tool call context for a call issued by this message.
    pub fn tool_call(
        &self,
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> ToolCallContext {
        ToolCallContext {
            message: self.clone(),
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
        }
    }
}

impl ExecutionContext for MessageContext {
    fn thread_id(&self) -> &str {
        &self.thread_id
    }

    fn message_id(&self) -> &str {
        &self.message_id
    }
}

// ============================================================================
// ToolCallContext
// ============================================================================

/// Context for tool-level execution.
///
/// Tools receive a `ToolCallContext` and cannot reach the thread store or the
/// control loop through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallContext {
    message: MessageContext,
    /// Server-issued identifier of this tool call.
    tool_call_id: String,
    tool_name: String,
}

impl ToolCallContext {
    /// Create a new ToolCallContext.
    pub fn new(
        thread_id: impl Into<String>,
        message_id: impl Into<String>,
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> Self {
        MessageContext::new(thread_id, message_id).tool_call(tool_call_id, tool_name)
    }

    /// Returns the unique tool call identifier.
    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    /// Returns the name of the tool being invoked.
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Returns the enclosing message context.
    pub fn message(&self) -> &MessageContext {
        &self.message
    }
}

impl ExecutionContext for ToolCallContext {
    fn thread_id(&self) -> &str {
        self.message.thread_id()
    }

    fn message_id(&self) -> &str {
        self.message.message_id()
    }
}
