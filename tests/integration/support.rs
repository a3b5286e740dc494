//! Scripted in-memory `ThreadsClient` and message builders shared by the
//! integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use threadline::{
    ComponentRegistry, GenerationStage, Message, MessageRole, ThreadProvider, ThreadSummary,
    ThreadlineConfig, ThreadsClient, ToolCallRequest, ToolRegistry,
};
use threadline_client::{
    AdvanceParams, AdvanceResponse, ChunkStream, ClientError, ClientResult, StreamChunk,
};
use threadline_core::{ComponentStateMap, ContentPart};

/// A recorded advance request.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub thread_id: Option<String>,
    pub params: AdvanceParams,
}

/// Replays queued responses and streams in order and records every call.
#[derive(Default)]
pub struct ScriptedClient {
    responses: Mutex<VecDeque<ClientResult<AdvanceResponse>>>,
    streams: Mutex<VecDeque<ChunkStream>>,
    pub requests: Mutex<Vec<Recorded>>,
    pub cancels: Mutex<Vec<String>>,
    pub state_writes: Mutex<Vec<(String, String, ComponentStateMap)>>,
    pub fail_state_writes: bool,
    pub generated_name: Option<String>,
    pub listed: Mutex<Vec<ThreadSummary>>,
    pub list_calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generated_name(mut self, name: &str) -> Self {
        self.generated_name = Some(name.to_string());
        self
    }

    pub fn with_failing_state_writes(mut self) -> Self {
        self.fail_state_writes = true;
        self
    }

    pub fn push_response(&self, response: AdvanceResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_stream(&self, chunks: Vec<StreamChunk>) {
        let stream = futures_util::stream::iter(chunks.into_iter().map(Ok)).boxed();
        self.streams.lock().unwrap().push_back(stream);
    }

    /// Queue a stream whose chunks the test sends one at a time.
    pub fn push_channel(&self) -> mpsc::Sender<ClientResult<StreamChunk>> {
        let (tx, rx) = mpsc::channel(8);
        self.streams
            .lock()
            .unwrap()
            .push_back(ReceiverStream::new(rx).boxed());
        tx
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, thread_id: Option<&str>, params: &AdvanceParams) {
        self.requests.lock().unwrap().push(Recorded {
            thread_id: thread_id.map(str::to_string),
            params: params.clone(),
        });
    }
}

#[async_trait]
impl ThreadsClient for ScriptedClient {
    async fn advance(
        &self,
        thread_id: Option<&str>,
        params: &AdvanceParams,
    ) -> ClientResult<AdvanceResponse> {
        self.record(thread_id, params);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::network("no scripted response")))
    }

    async fn advance_stream(
        &self,
        thread_id: Option<&str>,
        params: &AdvanceParams,
    ) -> ClientResult<ChunkStream> {
        self.record(thread_id, params);
        self.streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ClientError::network("no scripted stream"))
    }

    async fn generate_name(&self, thread_id: &str) -> ClientResult<ThreadSummary> {
        match &self.generated_name {
            Some(name) => Ok(ThreadSummary::new(thread_id, Some(name.clone()))),
            None => Err(ClientError::network("naming unavailable")),
        }
    }

    async fn list_threads(&self, _context_key: Option<&str>) -> ClientResult<Vec<ThreadSummary>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.listed.lock().unwrap().clone())
    }

    async fn cancel(&self, thread_id: &str) -> ClientResult<()> {
        self.cancels.lock().unwrap().push(thread_id.to_string());
        Ok(())
    }

    async fn update_component_state(
        &self,
        thread_id: &str,
        message_id: &str,
        state: &ComponentStateMap,
    ) -> ClientResult<()> {
        self.state_writes.lock().unwrap().push((
            thread_id.to_string(),
            message_id.to_string(),
            state.clone(),
        ));
        if self.fail_state_writes {
            return Err(ClientError::Http {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Builders
// ============================================================================

pub const THREAD: &str = "thread-1";

pub fn provider_with(
    client: Arc<ScriptedClient>,
    tools: ToolRegistry,
    config: ThreadlineConfig,
) -> ThreadProvider {
    ThreadProvider::new(config, client, tools, ComponentRegistry::new()).unwrap()
}

pub fn assistant(id: &str, text: &str) -> Message {
    Message::new(id, THREAD, MessageRole::Assistant, vec![ContentPart::text(text)])
}

pub fn with_tool_call(mut message: Message, call_id: &str, tool: &str, arguments: Value) -> Message {
    message.tool_call_request = Some(ToolCallRequest::new(call_id, tool, arguments));
    message
}

pub fn response(message: Message, stage: GenerationStage) -> AdvanceResponse {
    AdvanceResponse::new(message, stage)
}

pub fn chunk(message: Message, stage: GenerationStage) -> StreamChunk {
    StreamChunk::Message(AdvanceResponse::new(message, stage))
}
