//! Tool-Call Accumulator
//!
//! Materializes tool calls from streamed start / argument-delta / end events.
//! Argument fragments are concatenated verbatim and only parsed when the end
//! event arrives. Until then the raw text is available to the speculative
//! execution path.

use std::collections::HashMap;

use serde_json::Value;
use threadline_core::ToolCallRequest;

use crate::error::{ToolError, ToolResult};

/// A tool call being assembled from stream events.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingToolCall {
    pub tool_call_id: String,
    pub tool_name: String,
    /// Concatenated argument fragments received so far.
    pub raw_arguments: String,
    /// Parsed arguments, present once the call has been finalized.
    pub arguments: Option<Value>,
}

impl PendingToolCall {
    /// Whether the end event has been processed.
    pub fn is_finished(&self) -> bool {
        self.arguments.is_some()
    }

    /// The finalized request, if the call is finished.
    pub fn to_request(&self) -> Option<ToolCallRequest> {
        self.arguments.as_ref().map(|arguments| {
            ToolCallRequest::new(&self.tool_call_id, &self.tool_name, arguments.clone())
        })
    }
}

/// Tracks pending tool calls keyed by server-issued call id.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: HashMap<String, PendingToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking a call.
    pub fn start(
        &mut self,
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> ToolResult<()> {
        let tool_call_id = tool_call_id.into();
        if self.calls.contains_key(&tool_call_id) {
            return Err(ToolError::DuplicateToolCall(tool_call_id));
        }
        self.calls.insert(
            tool_call_id.clone(),
            PendingToolCall {
                tool_call_id,
                tool_name: tool_name.into(),
                raw_arguments: String::new(),
                arguments: None,
            },
        );
        Ok(())
    }

    /// Append an argument fragment. Returns the updated in-progress call.
    pub fn append_args(&mut self, tool_call_id: &str, fragment: &str) -> ToolResult<&PendingToolCall> {
        let call = self
            .calls
            .get_mut(tool_call_id)
            .ok_or_else(|| ToolError::UnknownToolCall(tool_call_id.to_string()))?;
        if call.is_finished() {
            return Err(ToolError::AlreadyFinalized(tool_call_id.to_string()));
        }
        call.raw_arguments.push_str(fragment);
        Ok(call)
    }

    /// Finalize a call by parsing its accumulated arguments.
    ///
    /// The concatenation must be a complete JSON document; there is no
    /// fallback to an empty object.
    pub fn end(&mut self, tool_call_id: &str) -> ToolResult<ToolCallRequest> {
        let call = self
            .calls
            .get_mut(tool_call_id)
            .ok_or_else(|| ToolError::UnknownToolCall(tool_call_id.to_string()))?;
        if call.is_finished() {
            return Err(ToolError::AlreadyFinalized(tool_call_id.to_string()));
        }

        let arguments: Value = serde_json::from_str(&call.raw_arguments).map_err(|source| {
            ToolError::MalformedArguments {
                tool_call_id: call.tool_call_id.clone(),
                tool_name: call.tool_name.clone(),
                source,
            }
        })?;

        call.arguments = Some(arguments.clone());
        Ok(ToolCallRequest::new(
            &call.tool_call_id,
            &call.tool_name,
            arguments,
        ))
    }

    /// Finalized calls among `ids`, in the order given.
    pub fn finished<'a, I>(&self, ids: I) -> Vec<ToolCallRequest>
    where
        I: IntoIterator<Item = &'a str>,
    {
        ids.into_iter()
            .filter_map(|id| self.calls.get(id))
            .filter_map(PendingToolCall::to_request)
            .collect()
    }

    /// Tool name and raw (possibly incomplete) arguments of a tracked call.
    pub fn accumulating(&self, tool_call_id: &str) -> Option<(&str, &str)> {
        self.calls
            .get(tool_call_id)
            .map(|call| (call.tool_name.as_str(), call.raw_arguments.as_str()))
    }

    /// Stop tracking the given calls.
    pub fn clear<'a, I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for id in ids {
            self.calls.remove(id);
        }
    }

    /// Stop tracking every call.
    pub fn clear_all(&mut self) {
        self.calls.clear();
    }

    /// Number of tracked calls.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
