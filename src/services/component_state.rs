//! Component-State Sync
//!
//! `ComponentState<T>` holds one key of a message's component state and
//! reconciles three sources for it:
//!
//! 1. an initial value supplied when the handle is created,
//! 2. a live "prop" value pushed by the owner through `set_from_prop`,
//! 3. the server-confirmed value stored in the message's state bag.
//!
//! Once a server value has been read for the key, live props are ignored for
//! the rest of the handle's lifetime. Writes update the local value at once,
//! patch the local message, and reach the remote store through a trailing
//! debounce. A failed remote write is logged and the local value is kept.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use threadline_client::ComponentStateStore;
use threadline_core::{ComponentStateMap, ExecutionContext, Message, MessageContext};

use crate::services::thread::store::ThreadStore;
use crate::utils::debounce::Debouncer;
use crate::utils::error::ThreadlineResult;

struct Local<T> {
    value: T,
    /// A server value has been read, or a write was made through this handle
    prop_locked: bool,
}

/// Synchronized state for one `(message, key)` pair.
pub struct ComponentState<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + 'static,
{
    ctx: MessageContext,
    key: String,
    store: Arc<ThreadStore>,
    local: Mutex<Local<T>>,
    last_error: Arc<Mutex<Option<String>>>,
    writer: Debouncer<Value>,
}

impl<T> ComponentState<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + 'static,
{
    /// Create a handle, adopting any value already stored on the message.
    pub fn new(
        ctx: MessageContext,
        key: impl Into<String>,
        initial: T,
        store: Arc<ThreadStore>,
        remote: Arc<dyn ComponentStateStore>,
        debounce: Duration,
    ) -> Self {
        let key = key.into();
        let last_error = Arc::new(Mutex::new(None));

        let writer = {
            let ctx = ctx.clone();
            let key = key.clone();
            let last_error = Arc::clone(&last_error);
            Debouncer::new(
                debounce,
                Arc::new(move |value: Value| {
                    let ctx = ctx.clone();
                    let key = key.clone();
                    let remote = Arc::clone(&remote);
                    let last_error = Arc::clone(&last_error);
                    async move {
                        let mut state = ComponentStateMap::new();
                        state.insert(key.clone(), value);
                        let outcome = remote.update_component_state(&ctx, state).await;
                        let mut slot = last_error.lock().unwrap_or_else(|e| e.into_inner());
                        match outcome {
                            Ok(()) => *slot = None,
                            Err(e) => {
                                tracing::warn!(
                                    thread_id = %ctx.thread_id(),
                                    message_id = %ctx.message_id(),
                                    key = %key,
                                    error = %e,
                                    "Component state write failed; keeping local value"
                                );
                                *slot = Some(e.to_string());
                            }
                        }
                    }
                    .boxed()
                }),
            )
        };

        let state = Self {
            ctx,
            key,
            store,
            local: Mutex::new(Local {
                value: initial,
                prop_locked: false,
            }),
            last_error,
            writer,
        };

        if let Some(message) = state
            .store
            .message(state.ctx.thread_id(), state.ctx.message_id())
        {
            state.sync_from_message(&message);
        }
        state
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn context(&self) -> &MessageContext {
        &self.ctx
    }

    /// Current local value.
    pub fn value(&self) -> T {
        self.lock().value.clone()
    }

    /// Update the value.
    ///
    /// The local value and the local message change immediately; the remote
    /// write is debounced.
    pub fn set_value(&self, value: T) -> ThreadlineResult<()> {
        let json = serde_json::to_value(&value)?;
        {
            let mut local = self.lock();
            local.value = value;
            local.prop_locked = true;
        }
        self.store.patch_component_state(
            self.ctx.thread_id(),
            self.ctx.message_id(),
            &self.key,
            json.clone(),
        );
        self.writer.call(json);
        Ok(())
    }

    /// Apply a live prop value.
    ///
    /// Returns `false` when the prop was ignored because the server value
    /// already owns the key.
    pub fn set_from_prop(&self, prop: T) -> bool {
        let mut local = self.lock();
        if local.prop_locked {
            tracing::debug!(key = %self.key, "Ignoring prop; server state already read");
            return false;
        }
        local.value = prop;
        true
    }

    /// Adopt the server-confirmed value carried by `message`.
    ///
    /// While a write is pending the local value wins, but the key still
    /// counts as read from the server.
    pub fn sync_from_message(&self, message: &Message) {
        if message.id != self.ctx.message_id() {
            return;
        }
        let Some(stored) = message.component_state.get(&self.key) else {
            return;
        };
        if stored.is_null() {
            return;
        }

        let pending = self.writer.is_pending();
        let mut local = self.lock();
        local.prop_locked = true;
        if pending {
            return;
        }
        match serde_json::from_value::<T>(stored.clone()) {
            Ok(value) => local.value = value,
            Err(e) => {
                tracing::warn!(
                    message_id = %message.id,
                    key = %self.key,
                    error = %e,
                    "Stored component state has an unexpected shape"
                );
            }
        }
    }

    /// Whether a remote write is waiting for the debounce window.
    pub fn is_pending(&self) -> bool {
        self.writer.is_pending()
    }

    /// Error of the most recent failed remote write, cleared on success.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Send any pending write now.
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    /// Flush and release the handle.
    pub async fn shutdown(self) {
        self.flush().await;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Local<T>> {
        self.local.lock().unwrap_or_else(|e| e.into_inner())
    }
}
