//! Tool Trait
//!
//! Client-side tool abstraction with split definition/execution traits:
//!
//! - `ToolDefinitionTrait` - identity, schemas, annotations, call budget
//! - `ToolExecutable` - the callback and its optional content transform
//! - `Tool` - combined trait (auto-implemented via blanket impl)
//! - `ToolRegistry` - O(1) lookup registry with ordered iteration
//! - `FunctionTool` - closure-based tool creation
//!
//! The split keeps schema-only consumers (the params builder that advertises
//! tools to the server) independent of execution.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ToolCallContext;
use crate::error::CoreResult;
use crate::schema::SchemaDescriptor;
use crate::thread::ContentPart;

// ============================================================================
// Annotations and wire form
// ============================================================================

/// Behavioural hints a tool declares about itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolAnnotations {
    /// Safe to invoke speculatively on partial arguments while they stream.
    #[serde(default)]
    pub streamable: bool,
}

/// Wire description of a client tool, as advertised to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_calls: Option<u32>,
    #[serde(default)]
    pub annotations: ToolAnnotations,
}

// ============================================================================
// Trait Definitions
// ============================================================================

/// Tool definition metadata trait.
pub trait ToolDefinitionTrait: Send + Sync {
    /// Unique name of this tool.
    fn name(&self) -> &str;

    /// Human-readable description the model sees.
    fn description(&self) -> &str;

    /// Schema of the argument object.
    fn input_schema(&self) -> SchemaDescriptor;

    /// Schema of the return value, if declared.
    fn output_schema(&self) -> Option<SchemaDescriptor> {
        None
    }

    /// Behavioural annotations. Defaults to not streamable.
    fn annotations(&self) -> ToolAnnotations {
        ToolAnnotations::default()
    }

    /// Maximum number of times this tool may be called in one turn.
    fn max_calls(&self) -> Option<u32> {
        None
    }
}

/// Tool execution trait.
#[async_trait]
pub trait ToolExecutable: Send + Sync {
    /// Invoke the tool.
    ///
    /// # Returns
    /// - `Ok(Value)` - the raw return value
    /// - `Err(CoreError)` - the failure; its message is reported to the model
    async fn execute(&self, ctx: &ToolCallContext, args: Value) -> CoreResult<Value>;

    /// Custom conversion of the return value into message content.
    ///
    /// `None` selects the default conversion (strings verbatim, anything
    /// else JSON-stringified into a single text part).
    fn transform_to_content(&self, _result: &Value) -> Option<Vec<ContentPart>> {
        None
    }
}

/// Combined trait for tools that provide both definition and execution.
pub trait Tool: ToolDefinitionTrait + ToolExecutable {}

impl<T: ToolDefinitionTrait + ToolExecutable> Tool for T {}

/// Build the wire spec for a tool.
pub fn tool_spec(tool: &dyn Tool) -> ToolSpec {
    ToolSpec {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        input_schema: tool.input_schema().to_json_schema(),
        output_schema: tool.output_schema().map(|s| s.to_json_schema()),
        max_calls: tool.max_calls(),
        annotations: tool.annotations(),
    }
}

// ============================================================================
// ToolRegistry
// ============================================================================

/// Registry of client tools keyed by name, iterated in registration order.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Insertion order for deterministic iteration.
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Builder-style registration.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Unregister a tool by name. Returns the removed tool, or None.
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.order.retain(|n| n != name);
        self.tools.remove(name)
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Wire specs in registration order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool_spec(tool.as_ref()))
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// FunctionTool
// ============================================================================

/// Future returned by a `FunctionTool` handler.
pub type ToolFuture = Pin<Box<dyn Future<Output = CoreResult<Value>> + Send>>;

/// Async handler used by `FunctionTool`.
pub type FunctionToolHandler = Arc<dyn Fn(ToolCallContext, Value) -> ToolFuture + Send + Sync>;

/// Content transform used by `FunctionTool`.
pub type ContentTransform = Arc<dyn Fn(&Value) -> Vec<ContentPart> + Send + Sync>;

/// A tool created from an async closure.
///
/// # Example
///
/// ```ignore
/// let tool = FunctionTool::new(
///     "echo",
///     "Echoes the input",
///     SchemaDescriptor::empty_object(),
///     |_ctx, args| Box::pin(async move { Ok(args) }),
/// );
/// ```
pub struct FunctionTool {
    tool_name: String,
    tool_description: String,
    input_schema: SchemaDescriptor,
    output_schema: Option<SchemaDescriptor>,
    annotations: ToolAnnotations,
    max_calls: Option<u32>,
    handler: FunctionToolHandler,
    transform: Option<ContentTransform>,
}

impl FunctionTool {
    /// Create a new FunctionTool from an async closure.
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: SchemaDescriptor,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolCallContext, Value) -> ToolFuture + Send + Sync + 'static,
    {
        Self {
            tool_name: name.into(),
            tool_description: description.into(),
            input_schema,
            output_schema: None,
            annotations: ToolAnnotations::default(),
            max_calls: None,
            handler: Arc::new(handler),
            transform: None,
        }
    }

    /// Declare the output schema.
    pub fn with_output_schema(mut self, schema: SchemaDescriptor) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Mark this tool as safe for speculative execution on partial arguments.
    pub fn with_streamable(mut self, streamable: bool) -> Self {
        self.annotations.streamable = streamable;
        self
    }

    /// Limit the number of calls per turn.
    pub fn with_max_calls(mut self, max_calls: u32) -> Self {
        self.max_calls = Some(max_calls);
        self
    }

    /// Supply a custom result-to-content conversion.
    pub fn with_content_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&Value) -> Vec<ContentPart> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }
}

impl ToolDefinitionTrait for FunctionTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        &self.tool_description
    }

    fn input_schema(&self) -> SchemaDescriptor {
        self.input_schema.clone()
    }

    fn output_schema(&self) -> Option<SchemaDescriptor> {
        self.output_schema.clone()
    }

    fn annotations(&self) -> ToolAnnotations {
        self.annotations
    }

    fn max_calls(&self) -> Option<u32> {
        self.max_calls
    }
}

#[async_trait]
impl ToolExecutable for FunctionTool {
    async fn execute(&self, ctx: &ToolCallContext, args: Value) -> CoreResult<Value> {
        (self.handler)(ctx.clone(), args).await
    }

    fn transform_to_content(&self, result: &Value) -> Option<Vec<ContentPart>> {
        self.transform.as_ref().map(|transform| transform(result))
    }
}

// ============================================================================
// Tests
// ============================================================================
