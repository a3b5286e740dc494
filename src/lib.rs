//! Threadline
//!
//! Client-side engine for advancing conversation threads against a remote
//! generation service. It includes:
//! - The thread-advance control loop (`ThreadProvider`)
//! - Local thread state, change events, and the thread-list cache
//! - Component registration and component-state sync
//! - Configuration and error types
//!
//! The data model lives in `threadline-core`, the remote API in
//! `threadline-client`, and tool execution in `threadline-tools`; their main
//! types are re-exported here.

pub mod config;
pub mod services;
pub mod utils;

// ── Configuration ──────────────────────────────────────────────────────
pub use config::ThreadlineConfig;

// ── Errors ─────────────────────────────────────────────────────────────
pub use utils::error::{ThreadlineError, ThreadlineResult};

// ── Thread Provider ────────────────────────────────────────────────────
pub use services::thread::{
    ContextHelper, EventBus, MessageInput, SendMessageOptions, ThreadEvent, ThreadListCache,
    ThreadListPatch, ThreadProvider, ThreadStore,
};

// ── Components ─────────────────────────────────────────────────────────
pub use services::component_state::ComponentState;
pub use services::components::{ComponentDefinition, ComponentRegistry};

// ── Workspace Crates ───────────────────────────────────────────────────
pub use threadline_client::{
    ClientConfig, ClientError, ComponentStateStore, HttpThreadsClient, ThreadSummary,
    ThreadsClient,
};
pub use threadline_core::{
    ContentPart, GenerationStage, Message, MessageContext, MessageRole, SchemaDescriptor, Thread,
    ToolCallContext, ToolCallRequest, ToolRegistry,
};
pub use threadline_tools::{ToolExecutor, ToolResponse};
