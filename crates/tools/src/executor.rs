//! Tool Executor
//!
//! Runs client tools on behalf of the control loop.
//!
//! - `execute` is the authoritative path: the result (or failure) is
//!   normalized into message content that is sent back to the server.
//! - `on_args_delta` is the speculative path for tools annotated
//!   `streamable`: partial arguments are parsed best-effort and the tool is
//!   invoked for its side effects only, throttled per tool-call id.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use threadline_core::{
    ContentPart, MessageContext, Tool, ToolCallContext, ToolCallRequest, ToolRegistry,
};
use tokio::task::JoinHandle;

use crate::partial_json::parse_partial;
use crate::throttle::KeyedThrottle;

/// Default cooldown between speculative executions of one tool call.
pub const DEFAULT_SPECULATIVE_COOLDOWN: Duration = Duration::from_millis(150);

/// Normalized outcome of an authoritative tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub tool_call_id: String,
    pub tool_name: String,
    pub content: Vec<ContentPart>,
    /// The tool failed or was not found; `content` carries the error text.
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResponse {
    /// Create a successful response
    pub fn ok(request: &ToolCallRequest, content: Vec<ContentPart>) -> Self {
        Self {
            tool_call_id: request.tool_call_id.clone(),
            tool_name: request.tool_name.clone(),
            content,
            is_error: false,
        }
    }

    /// Create an error response
    pub fn err(request: &ToolCallRequest, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: request.tool_call_id.clone(),
            tool_name: request.tool_name.clone(),
            content: vec![ContentPart::text(error)],
            is_error: true,
        }
    }

    /// Concatenated text content.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Default conversion of a tool return value into message content.
///
/// Strings pass through verbatim; any other value is JSON-stringified.
pub fn default_content(result: &Value) -> Vec<ContentPart> {
    match result {
        Value::String(text) => vec![ContentPart::text(text.clone())],
        other => vec![ContentPart::text(other.to_string())],
    }
}

struct SpeculativeCall {
    tool: Arc<dyn Tool>,
    ctx: ToolCallContext,
    args: Value,
}

/// Executes client tools, authoritatively or speculatively.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    throttle: KeyedThrottle<SpeculativeCall>,
    previews: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ToolExecutor {
    /// Create an executor with the default speculative cooldown.
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self::with_cooldown(registry, DEFAULT_SPECULATIVE_COOLDOWN)
    }

    /// Create an executor with a custom speculative cooldown.
    pub fn with_cooldown(registry: Arc<ToolRegistry>, cooldown: Duration) -> Self {
        let previews: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));
        let spawned = Arc::clone(&previews);
        let throttle = KeyedThrottle::new(
            cooldown,
            Arc::new(move |_key: &str, call: SpeculativeCall| {
                let handle = tokio::spawn(run_speculative(call));
                let mut running = spawned.lock().unwrap_or_else(|e| e.into_inner());
                running.retain(|task| !task.is_finished());
                running.push(handle);
            }),
        );
        Self {
            registry,
            throttle,
            previews,
        }
    }

    /// The registry tools are resolved from.
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run a tool call and normalize its outcome.
    ///
    /// Never fails: unknown tools and tool errors become `is_error` responses
    /// so the model can see what went wrong.
    pub async fn execute(&self, message: &MessageContext, request: &ToolCallRequest) -> ToolResponse {
        let Some(tool) = self.registry.get(&request.tool_name) else {
            tracing::warn!(
                tool_name = %request.tool_name,
                tool_call_id = %request.tool_call_id,
                "Tool not registered"
            );
            return ToolResponse::err(request, format!("Tool not found: {}", request.tool_name));
        };

        let ctx = message.tool_call(&request.tool_call_id, &request.tool_name);
        tracing::debug!(
            tool_name = %request.tool_name,
            tool_call_id = %request.tool_call_id,
            "Executing tool"
        );

        match tool.execute(&ctx, request.arguments.clone()).await {
            Ok(result) => {
                let content = tool
                    .transform_to_content(&result)
                    .unwrap_or_else(|| default_content(&result));
                ToolResponse::ok(request, content)
            }
            Err(e) => {
                tracing::debug!(
                    tool_name = %request.tool_name,
                    tool_call_id = %request.tool_call_id,
                    error = %e,
                    "Tool returned an error"
                );
                ToolResponse::err(request, e.to_string())
            }
        }
    }

    /// Feed the raw, possibly-incomplete arguments of a streaming call.
    ///
    /// Returns `true` when a speculative execution was scheduled.
    pub fn on_args_delta(&self, ctx: &ToolCallContext, raw_args: &str) -> bool {
        let Some(tool) = self.registry.get(ctx.tool_name()) else {
            return false;
        };
        if !tool.annotations().streamable {
            return false;
        }
        let Some(args) = parse_partial(raw_args) else {
            return false;
        };

        self.throttle.schedule(
            ctx.tool_call_id(),
            SpeculativeCall {
                tool,
                ctx: ctx.clone(),
                args,
            },
        );
        true
    }

    /// Run any pending trailing speculative executions now.
    ///
    /// The previews are spawned, not awaited; use `settle` when they must be
    /// done before the authoritative call.
    pub fn flush(&self) {
        self.throttle.flush();
    }

    /// Flush pending previews and wait for every running one to finish.
    pub async fn settle(&self) {
        self.flush();
        let running = std::mem::take(&mut *self.previews.lock().unwrap_or_else(|e| e.into_inner()));
        for task in running {
            if let Err(e) = task.await {
                tracing::debug!(error = %e, "Speculative tool preview task aborted");
            }
        }
    }
}

async fn run_speculative(call: SpeculativeCall) {
    tracing::debug!(
        tool_name = %call.ctx.tool_name(),
        tool_call_id = %call.ctx.tool_call_id(),
        "Speculative tool preview"
    );
    if let Err(e) = call.tool.execute(&call.ctx, call.args).await {
        tracing::debug!(
            tool_name = %call.ctx.tool_name(),
            tool_call_id = %call.ctx.tool_call_id(),
            error = %e,
            "Speculative tool preview failed"
        );
    }
}
