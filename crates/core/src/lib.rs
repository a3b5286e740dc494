//! Threadline Core
//!
//! Foundational data model, traits, and error types for the Threadline
//! workspace. This crate has no runtime dependencies (no Tokio, no HTTP) so
//! the client and tools crates can build on it independently.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `context` - Explicit request-scoped contexts (`MessageContext`, `ToolCallContext`)
//! - `generation_stage` - Generation lifecycle stages and the idle predicate
//! - `thread` - Threads, messages, content parts, tool-call requests
//! - `schema` - Closed schema descriptor union
//! - `tool_trait` - Tool abstraction (`ToolDefinitionTrait`, `ToolExecutable`, `Tool`, `ToolRegistry`)

pub mod context;
pub mod error;
pub mod generation_stage;
pub mod schema;
pub mod thread;
pub mod tool_trait;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Contexts ───────────────────────────────────────────────────────────
pub use context::{ExecutionContext, MessageContext, ToolCallContext};

// ── Generation Stage ───────────────────────────────────────────────────
pub use generation_stage::GenerationStage;

// ── Data Model ─────────────────────────────────────────────────────────
pub use thread::{
    ComponentDecision, ComponentStateMap, ContentPart, ImageUrl, Message, MessageRole,
    ResourceContent, Thread, ToolCallRequest, PLACEHOLDER_THREAD_ID,
};

// ── Schemas ────────────────────────────────────────────────────────────
pub use schema::{SchemaDescriptor, TypedSchema};

// ── Tools ──────────────────────────────────────────────────────────────
pub use tool_trait::{
    tool_spec, FunctionTool, Tool, ToolAnnotations, ToolDefinitionTrait, ToolExecutable,
    ToolFuture, ToolRegistry, ToolSpec,
};
