//! Threads Client Trait
//!
//! Defines the interface to the remote thread service. The control loop only
//! talks to the server through this trait, so tests can substitute scripted
//! in-memory implementations.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use threadline_core::{ComponentStateMap, ExecutionContext, MessageContext};

use crate::types::{
    AdvanceParams, AdvanceResponse, ClientError, ClientResult, StreamChunk, ThreadSummary,
};

/// Incremental response of a streaming advance call.
pub type ChunkStream = BoxStream<'static, ClientResult<StreamChunk>>;

/// Remote thread service.
///
/// A `thread_id` of `None` asks the server to create a new thread.
#[async_trait]
pub trait ThreadsClient: Send + Sync {
    /// Submit a message and wait for the complete response.
    async fn advance(
        &self,
        thread_id: Option<&str>,
        params: &AdvanceParams,
    ) -> ClientResult<AdvanceResponse>;

    /// Submit a message and receive the response incrementally.
    async fn advance_stream(
        &self,
        thread_id: Option<&str>,
        params: &AdvanceParams,
    ) -> ClientResult<ChunkStream>;

    /// Ask the server to name a thread from its content.
    async fn generate_name(&self, thread_id: &str) -> ClientResult<ThreadSummary>;

    /// List threads, optionally filtered by context key.
    async fn list_threads(&self, context_key: Option<&str>) -> ClientResult<Vec<ThreadSummary>>;

    /// Ask the server to stop generating on a thread.
    async fn cancel(&self, thread_id: &str) -> ClientResult<()>;

    /// Merge `state` into the stored component state of a message.
    async fn update_component_state(
        &self,
        thread_id: &str,
        message_id: &str,
        state: &ComponentStateMap,
    ) -> ClientResult<()>;
}

/// Remote message-state store used by component-state handles.
#[async_trait]
pub trait ComponentStateStore: Send + Sync {
    async fn update_component_state(
        &self,
        ctx: &MessageContext,
        state: ComponentStateMap,
    ) -> ClientResult<()>;
}

/// `ComponentStateStore` backed by a `ThreadsClient`.
#[derive(Clone)]
pub struct ClientStateStore {
    client: Arc<dyn ThreadsClient>,
}

impl ClientStateStore {
    pub fn new(client: Arc<dyn ThreadsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ComponentStateStore for ClientStateStore {
    async fn update_component_state(
        &self,
        ctx: &MessageContext,
        state: ComponentStateMap,
    ) -> ClientResult<()> {
        self.client
            .update_component_state(ctx.thread_id(), ctx.message_id(), &state)
            .await
    }
}

/// Helper function to map HTTP error status codes
pub fn parse_http_error(status: u16, body: &str) -> ClientError {
    match status {
        401 => ClientError::AuthenticationFailed {
            message: "Invalid API key".to_string(),
        },
        403 => ClientError::AuthenticationFailed {
            message: format!("Access denied: {}", body),
        },
        _ => ClientError::Http {
            status,
            body: body.to_string(),
        },
    }
}
