//! Thread Provider
//!
//! Drives the thread-advance protocol: submit a message, consume the reply
//! (one response or a chunk stream), run any client tool the model asks for,
//! resubmit the tool result, and repeat until a reply carries no tool call.
//!
//! Both transports run the same explicit loop; only the way the next reply
//! is obtained differs. Cancellation is a single flag per provider, checked
//! before each reply or chunk is processed and after each tool execution.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use threadline_client::{
    AdvanceParams, AdvanceResponse, ClientError, ClientStateStore, ComponentStateStore,
    HttpThreadsClient, OutgoingMessage, StreamChunk, ThreadSummary, ThreadsClient,
};
use threadline_core::{
    ContentPart, GenerationStage, Message, MessageContext, MessageRole, Thread, ToolCallRequest,
    ToolDefinitionTrait, ToolRegistry, PLACEHOLDER_THREAD_ID,
};
use threadline_tools::{ToolCallAccumulator, ToolExecutor};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::cache::{ThreadListCache, ThreadListPatch};
use super::events::{EventBus, ThreadEvent};
use super::naming::ThreadNamer;
use super::store::ThreadStore;
use crate::config::ThreadlineConfig;
use crate::services::component_state::ComponentState;
use crate::services::components::ComponentRegistry;
use crate::utils::error::{ThreadlineError, ThreadlineResult};

/// Produces a value merged into the additional context of every send.
/// `None` leaves the helper's key out.
pub type ContextHelper = Arc<dyn Fn() -> BoxFuture<'static, Option<Value>> + Send + Sync>;

// ============================================================================
// Send input and options
// ============================================================================

/// Content of a user turn.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageInput {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageInput {
    fn into_parts(self) -> Vec<ContentPart> {
        match self {
            MessageInput::Text(text) => vec![ContentPart::text(text)],
            MessageInput::Parts(parts) => parts,
        }
    }
}

impl From<&str> for MessageInput {
    fn from(text: &str) -> Self {
        MessageInput::Text(text.to_string())
    }
}

impl From<String> for MessageInput {
    fn from(text: String) -> Self {
        MessageInput::Text(text)
    }
}

impl From<Vec<ContentPart>> for MessageInput {
    fn from(parts: Vec<ContentPart>) -> Self {
        MessageInput::Parts(parts)
    }
}

/// Per-send options.
#[derive(Debug, Clone, Default)]
pub struct SendMessageOptions {
    /// Target thread; `None` is the current thread and the placeholder id
    /// starts a new one
    pub thread_id: Option<String>,
    /// Streamed transport; `None` follows the configuration
    pub stream: Option<bool>,
    /// Call budgets overriding the tools' own limits
    pub tool_call_limits: HashMap<String, u32>,
    pub additional_context: Option<serde_json::Map<String, Value>>,
    pub context_key: Option<String>,
    /// Tool the model must call on the first submission
    pub force_tool_choice: Option<String>,
}

impl SendMessageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Target a new thread.
    pub fn new_thread(self) -> Self {
        self.with_thread(PLACEHOLDER_THREAD_ID)
    }

    pub fn streamed(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn with_tool_limit(mut self, tool_name: impl Into<String>, limit: u32) -> Self {
        self.tool_call_limits.insert(tool_name.into(), limit);
        self
    }

    pub fn with_additional_context(mut self, context: serde_json::Map<String, Value>) -> Self {
        self.additional_context = Some(context);
        self
    }

    pub fn with_context_key(mut self, context_key: impl Into<String>) -> Self {
        self.context_key = Some(context_key.into());
        self
    }

    pub fn with_forced_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.force_tool_choice = Some(tool_name.into());
        self
    }
}

/// Mutable state of one send.
struct Turn {
    /// Local thread the turn writes to; follows a server-assigned id
    thread_id: String,
    /// Thread id sent to the server; `None` asks it to create one
    remote_thread_id: Option<String>,
    context_key: Option<String>,
    force_tool_choice: Option<String>,
    limits: HashMap<String, u32>,
    counts: HashMap<String, u32>,
    executed: HashSet<String>,
}

impl Turn {
    fn new(thread_id: String, options: &SendMessageOptions) -> Self {
        let remote_thread_id = (thread_id != PLACEHOLDER_THREAD_ID).then(|| thread_id.clone());
        Self {
            thread_id,
            remote_thread_id,
            context_key: options.context_key.clone(),
            force_tool_choice: options.force_tool_choice.clone(),
            limits: options.tool_call_limits.clone(),
            counts: HashMap::new(),
            executed: HashSet::new(),
        }
    }

    /// A pending request that has not been executed in this turn yet.
    fn unhandled(&self, request: Option<&ToolCallRequest>) -> Option<ToolCallRequest> {
        request
            .filter(|r| !self.executed.contains(&r.tool_call_id))
            .cloned()
    }
}

// ============================================================================
// ThreadProvider
// ============================================================================

/// Client-side owner of thread state and the thread-advance loop.
///
/// At most one send is expected to be active per provider; `cancel` stops
/// whichever send is running.
pub struct ThreadProvider {
    config: ThreadlineConfig,
    client: Arc<dyn ThreadsClient>,
    tools: Arc<ToolRegistry>,
    components: ComponentRegistry,
    executor: ToolExecutor,
    store: Arc<ThreadStore>,
    cache: Arc<ThreadListCache>,
    namer: ThreadNamer,
    state_store: Arc<dyn ComponentStateStore>,
    context_helpers: Mutex<BTreeMap<String, ContextHelper>>,
    cancelled: AtomicBool,
    access_token: Mutex<Option<String>>,
}

impl ThreadProvider {
    /// Create a provider over an existing client.
    pub fn new(
        config: ThreadlineConfig,
        client: Arc<dyn ThreadsClient>,
        tools: ToolRegistry,
        components: ComponentRegistry,
    ) -> ThreadlineResult<Self> {
        config.validate()?;

        let tools = Arc::new(tools);
        let store = Arc::new(ThreadStore::new(EventBus::new(config.event_channel_capacity)));
        let cache = Arc::new(ThreadListCache::new(
            config.thread_list_cache_capacity,
            config.thread_list_cache_ttl(),
        ));
        let namer = ThreadNamer::new(
            Arc::clone(&client),
            Arc::clone(&store),
            Arc::clone(&cache),
            config.auto_generate_thread_name,
            config.auto_generate_name_threshold,
        );
        let executor = ToolExecutor::with_cooldown(Arc::clone(&tools), config.speculative_cooldown());
        let state_store: Arc<dyn ComponentStateStore> =
            Arc::new(ClientStateStore::new(Arc::clone(&client)));

        Ok(Self {
            config,
            client,
            tools,
            components,
            executor,
            store,
            cache,
            namer,
            state_store,
            context_helpers: Mutex::new(BTreeMap::new()),
            cancelled: AtomicBool::new(false),
            access_token: Mutex::new(None),
        })
    }

    /// Create a provider talking HTTP to `config.client.base_url`.
    pub fn connect(
        config: ThreadlineConfig,
        tools: ToolRegistry,
        components: ComponentRegistry,
    ) -> ThreadlineResult<Self> {
        let client = HttpThreadsClient::new(&config.client)?;
        Self::new(config, Arc::new(client), tools, components)
    }

    pub fn config(&self) -> &ThreadlineConfig {
        &self.config
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    pub fn store(&self) -> &Arc<ThreadStore> {
        &self.store
    }

    // ========================================================================
    // Thread state
    // ========================================================================

    pub fn current_thread(&self) -> Thread {
        self.store.current_thread()
    }

    pub fn thread(&self, thread_id: &str) -> Option<Thread> {
        self.store.thread(thread_id)
    }

    pub fn switch_thread(&self, thread_id: &str) {
        self.store.switch_to(thread_id);
    }

    pub fn start_new_thread(&self) {
        self.store.start_new_thread();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ThreadEvent> {
        self.store.events().subscribe()
    }

    /// Whether the current thread accepts new input.
    pub fn is_idle(&self) -> bool {
        self.store
            .stage(&self.store.current_thread_id())
            .is_idle()
    }

    /// Latest access token issued by the server.
    pub fn access_token(&self) -> Option<String> {
        self.access_token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Threads for a context key, served from the cache while fresh.
    pub async fn thread_list(&self, context_key: Option<&str>) -> ThreadlineResult<Vec<ThreadSummary>> {
        if let Some(threads) = self.cache.get_fresh(context_key) {
            return Ok(threads);
        }
        let threads = self.client.list_threads(context_key).await?;
        self.cache.put(context_key, threads.clone());
        Ok(threads)
    }

    /// Cached thread list, including local patches, without fetching.
    pub fn cached_thread_list(&self, context_key: Option<&str>) -> Option<Vec<ThreadSummary>> {
        self.cache.get(context_key)
    }

    /// Register a helper whose value is sent under `name` in the additional
    /// context of every send.
    pub fn register_context_helper(&self, name: impl Into<String>, helper: ContextHelper) {
        self.context_helpers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.into(), helper);
    }

    pub fn unregister_context_helper(&self, name: &str) -> bool {
        self.context_helpers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
            .is_some()
    }

    /// Synchronized component state for one key of a message.
    pub fn component_state<T>(
        &self,
        ctx: MessageContext,
        key: impl Into<String>,
        initial: T,
    ) -> ComponentState<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + 'static,
    {
        ComponentState::new(
            ctx,
            key,
            initial,
            Arc::clone(&self.store),
            Arc::clone(&self.state_store),
            self.config.component_state_debounce(),
        )
    }

    // ========================================================================
    // Send / cancel
    // ========================================================================

    /// Stop the active send.
    ///
    /// The running loop returns an empty placeholder message at its next
    /// check. A tool that has already started is not interrupted.
    pub async fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);

        let thread_id = self.store.current_thread_id();
        if self.store.stage(&thread_id).is_idle() {
            return;
        }
        self.store.set_stage(&thread_id, GenerationStage::Cancelled);
        tracing::debug!(thread_id = %thread_id, "Send cancelled");

        if thread_id != PLACEHOLDER_THREAD_ID {
            if let Err(e) = self.client.cancel(&thread_id).await {
                tracing::warn!(thread_id = %thread_id, error = %e, "Server cancel failed");
            }
        }
    }

    /// Send a user message and run the exchange to completion.
    ///
    /// Returns the final reply, or an empty placeholder message when the send
    /// was cancelled.
    pub async fn send_message(
        &self,
        input: impl Into<MessageInput>,
        options: SendMessageOptions,
    ) -> ThreadlineResult<Message> {
        self.cancelled.store(false, Ordering::SeqCst);

        let current = self.store.current_thread_id();
        let thread_id = options.thread_id.clone().unwrap_or(current.clone());
        let stage = self.store.stage(&thread_id);
        if !stage.is_idle() {
            return Err(ThreadlineError::Busy { thread_id, stage });
        }
        if thread_id != current {
            self.store.switch_to(&thread_id);
        }

        let content = input.into().into_parts();
        let mut user_message = Message::new(
            Uuid::new_v4().to_string(),
            &thread_id,
            MessageRole::User,
            content.clone(),
        );
        user_message.additional_context = options.additional_context.clone();
        self.store.upsert_message(&thread_id, user_message);
        self.store.set_stage(&thread_id, GenerationStage::FetchingContext);

        let additional_context = self.gather_context(options.additional_context.clone()).await;
        let outgoing = OutgoingMessage::user(content).with_additional_context(additional_context);
        let stream = options.stream.unwrap_or(self.config.stream_by_default);
        let mut turn = Turn::new(thread_id, &options);
        tracing::debug!(thread_id = %turn.thread_id, stream, "Sending message");

        let outcome = if stream {
            self.advance_streamed(&mut turn, outgoing).await
        } else {
            self.advance_single(&mut turn, outgoing).await
        };

        match outcome {
            Ok(Some(_)) if self.is_cancelled() => Ok(self.finish_cancelled(&turn)),
            Ok(Some(message)) => {
                self.store.set_stage(&turn.thread_id, GenerationStage::Complete);
                self.namer.maybe_generate(&turn.thread_id);
                Ok(message)
            }
            Ok(None) => Ok(self.finish_cancelled(&turn)),
            Err(_) if self.is_cancelled() => Ok(self.finish_cancelled(&turn)),
            Err(e) => {
                tracing::debug!(thread_id = %turn.thread_id, error = %e, "Send failed");
                self.store.set_stage(&turn.thread_id, GenerationStage::Error);
                self.store.set_latest_message_error(&turn.thread_id, &e.to_string());
                Err(e)
            }
        }
    }

    // ========================================================================
    // Advance loop
    // ========================================================================

    /// One request, one response, repeated while responses request tools.
    async fn advance_single(
        &self,
        turn: &mut Turn,
        outgoing: OutgoingMessage,
    ) -> ThreadlineResult<Option<Message>> {
        let mut params = self.params(turn, outgoing);
        loop {
            if self.is_cancelled() {
                return Ok(None);
            }
            let response = self
                .client
                .advance(turn.remote_thread_id.as_deref(), &params)
                .await?;
            if self.is_cancelled() {
                return Ok(None);
            }

            let message = self.accept_response(turn, &response);
            let Some(request) = turn.unhandled(message.pending_tool_call()) else {
                return Ok(Some(message));
            };
            if self.budget_exhausted(turn, &request.tool_name) {
                return Ok(Some(message));
            }

            self.store.set_stage(&turn.thread_id, GenerationStage::FetchingContext);
            let result = self.run_tool(turn, &message, &request).await;
            if self.is_cancelled() {
                return Ok(None);
            }
            self.store.set_stage(&turn.thread_id, GenerationStage::HydratingComponent);
            params = self.params(turn, result);
        }
    }

    /// One request, many chunks. A tool call abandons the current stream and
    /// the continuation is read from a new one.
    async fn advance_streamed(
        &self,
        turn: &mut Turn,
        outgoing: OutgoingMessage,
    ) -> ThreadlineResult<Option<Message>> {
        let mut params = self.params(turn, outgoing);
        let outcome = 'turn: loop {
            if self.is_cancelled() {
                break None;
            }
            let mut stream = self
                .client
                .advance_stream(turn.remote_thread_id.as_deref(), &params)
                .await?;
            if self.is_cancelled() {
                break None;
            }
            self.store.set_stage(&turn.thread_id, GenerationStage::StreamingResponse);

            let mut accumulator = ToolCallAccumulator::new();
            let mut in_flight: Option<Message> = None;

            while let Some(chunk) = stream.next().await {
                if self.is_cancelled() {
                    break 'turn None;
                }

                let request = match chunk? {
                    StreamChunk::Message(response) => {
                        let message = self.accept_response(turn, &response);
                        let request = if response.generation_stage == GenerationStage::FetchingContext {
                            turn.unhandled(message.pending_tool_call())
                        } else {
                            None
                        };
                        in_flight = Some(message);
                        request
                    }
                    StreamChunk::ToolCallStart {
                        tool_call_id,
                        tool_name,
                    } => {
                        accumulator.start(tool_call_id, tool_name)?;
                        None
                    }
                    StreamChunk::ToolCallArgs {
                        tool_call_id,
                        delta,
                    } => {
                        let call = accumulator.append_args(&tool_call_id, &delta)?;
                        let message_id = self.ensure_in_flight(turn, &mut in_flight);
                        let ctx = MessageContext::new(&turn.thread_id, message_id)
                            .tool_call(&call.tool_call_id, &call.tool_name);
                        self.executor.on_args_delta(&ctx, &call.raw_arguments);
                        None
                    }
                    StreamChunk::ToolCallEnd { tool_call_id } => {
                        let request = accumulator.end(&tool_call_id)?;
                        accumulator.clear([tool_call_id.as_str()]);
                        turn.unhandled(Some(&request))
                    }
                };

                let Some(request) = request else {
                    continue;
                };
                // Previews for this call finish before the authoritative run.
                self.executor.settle().await;
                self.ensure_in_flight(turn, &mut in_flight);
                let message = match in_flight.take() {
                    Some(message) => self.attach_request(turn, message, &request),
                    None => continue,
                };
                if self.budget_exhausted(turn, &request.tool_name) {
                    break 'turn Some(message);
                }

                self.store.set_stage(&turn.thread_id, GenerationStage::FetchingContext);
                let result = self.run_tool(turn, &message, &request).await;
                if self.is_cancelled() {
                    break 'turn None;
                }
                params = self.params(turn, result);
                continue 'turn;
            }

            self.executor.flush();
            if self.is_cancelled() {
                break None;
            }
            match in_flight {
                Some(message) => break Some(message),
                None => {
                    return Err(ClientError::stream("Stream ended without a message").into());
                }
            }
        };

        self.executor.flush();
        Ok(outcome)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn finish_cancelled(&self, turn: &Turn) -> Message {
        self.store.set_stage(&turn.thread_id, GenerationStage::Cancelled);
        Message::new(
            Uuid::new_v4().to_string(),
            &turn.thread_id,
            MessageRole::Assistant,
            Vec::new(),
        )
    }

    fn params(&self, turn: &mut Turn, message: OutgoingMessage) -> AdvanceParams {
        let mut params = AdvanceParams::new(message);
        params.available_components = self.components.available_components();
        params.client_tools = self.tools.specs();
        params.tool_call_counts = turn.counts.clone();
        params.context_key = turn.context_key.clone();
        // Forcing only applies to the first submission of a turn.
        params.force_tool_choice = turn.force_tool_choice.take();
        params
    }

    /// Merge helper values under the caller's context; caller keys win.
    async fn gather_context(
        &self,
        explicit: Option<serde_json::Map<String, Value>>,
    ) -> Option<serde_json::Map<String, Value>> {
        let helpers: Vec<(String, ContextHelper)> = self
            .context_helpers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(name, helper)| (name.clone(), Arc::clone(helper)))
            .collect();

        let mut context = serde_json::Map::new();
        for (name, helper) in helpers {
            if let Some(value) = helper().await {
                context.insert(name, value);
            }
        }
        if let Some(explicit) = explicit {
            context.extend(explicit);
        }
        (!context.is_empty()).then_some(context)
    }

    /// Record a reply: cache its access token, adopt a server-assigned
    /// thread id, and upsert its message locally.
    fn accept_response(&self, turn: &mut Turn, response: &AdvanceResponse) -> Message {
        if let Some(token) = &response.access_token {
            *self.access_token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
        }

        let server_thread_id = response.thread_id();
        if !server_thread_id.is_empty() && server_thread_id != turn.thread_id {
            self.adopt_thread(turn, server_thread_id);
        }

        let mut message = response.response_message_dto.clone();
        message.thread_id = turn.thread_id.clone();
        self.store.upsert_message(&turn.thread_id, message.clone());
        message
    }

    fn adopt_thread(&self, turn: &mut Turn, thread_id: &str) {
        self.store.rehome(&turn.thread_id, thread_id);
        turn.thread_id = thread_id.to_string();
        turn.remote_thread_id = Some(thread_id.to_string());

        let mut summary = ThreadSummary::new(thread_id, None);
        summary.context_key = turn.context_key.clone();
        let context_key = turn.context_key.as_deref();
        self.cache.apply(context_key, ThreadListPatch::Insert(summary));
        self.cache.invalidate(context_key);
    }

    /// Id of the in-flight message, creating an empty assistant message when
    /// tool events arrive before any message chunk.
    fn ensure_in_flight(&self, turn: &Turn, in_flight: &mut Option<Message>) -> String {
        if let Some(message) = in_flight {
            return message.id.clone();
        }
        let message = Message::new(
            Uuid::new_v4().to_string(),
            &turn.thread_id,
            MessageRole::Assistant,
            Vec::new(),
        );
        self.store.upsert_message(&turn.thread_id, message.clone());
        let id = message.id.clone();
        *in_flight = Some(message);
        id
    }

    /// Make `message` carry `request` if it does not already.
    fn attach_request(&self, turn: &Turn, mut message: Message, request: &ToolCallRequest) -> Message {
        if message.pending_tool_call().is_none() {
            message.tool_call_request = Some(request.clone());
            self.store.upsert_message(&turn.thread_id, message.clone());
        }
        message
    }

    fn call_limit(&self, turn: &Turn, tool_name: &str) -> Option<u32> {
        turn.limits
            .get(tool_name)
            .copied()
            .or_else(|| self.tools.get(tool_name).and_then(|tool| tool.max_calls()))
            .or(self.config.default_tool_call_limit)
    }

    fn budget_exhausted(&self, turn: &Turn, tool_name: &str) -> bool {
        let Some(limit) = self.call_limit(turn, tool_name) else {
            return false;
        };
        let used = turn.counts.get(tool_name).copied().unwrap_or(0);
        if used < limit {
            return false;
        }
        tracing::warn!(
            thread_id = %turn.thread_id,
            tool_name = %tool_name,
            limit,
            "Tool call budget exhausted; returning last response"
        );
        true
    }

    /// Execute a tool call, record its result locally, and build the
    /// submission that carries it back to the server.
    async fn run_tool(
        &self,
        turn: &mut Turn,
        message: &Message,
        request: &ToolCallRequest,
    ) -> OutgoingMessage {
        *turn.counts.entry(request.tool_name.clone()).or_insert(0) += 1;
        turn.executed.insert(request.tool_call_id.clone());

        let ctx = MessageContext::new(&turn.thread_id, &message.id);
        let response = self.executor.execute(&ctx, request).await;

        let mut result_message = Message::new(
            Uuid::new_v4().to_string(),
            &turn.thread_id,
            MessageRole::Tool,
            response.content.clone(),
        );
        result_message.tool_call_id = Some(response.tool_call_id.clone());
        if response.is_error {
            result_message.error = Some(response.text());
        }
        self.store.upsert_message(&turn.thread_id, result_message);

        OutgoingMessage::tool_result(response.tool_call_id, response.content, response.is_error)
            .with_component(message.component.clone())
    }
}
