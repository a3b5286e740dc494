//! Thread Auto-Naming
//!
//! Once a thread has enough messages and still has no name, ask the server
//! to generate one. The request runs in the background and never blocks a
//! send; its failures are only logged.

use std::sync::Arc;

use threadline_client::ThreadsClient;
use threadline_core::Thread;
use tokio::task::JoinHandle;

use super::cache::{ThreadListCache, ThreadListPatch};
use super::store::ThreadStore;

/// Whether a thread qualifies for a generated name.
pub fn should_generate_name(thread: &Thread, threshold: usize, already_requested: bool) -> bool {
    !already_requested
        && !thread.is_placeholder()
        && thread.name.is_none()
        && thread.messages.len() >= threshold
}

/// Fire-and-forget name generation.
pub struct ThreadNamer {
    client: Arc<dyn ThreadsClient>,
    store: Arc<ThreadStore>,
    cache: Arc<ThreadListCache>,
    enabled: bool,
    threshold: usize,
}

impl ThreadNamer {
    pub fn new(
        client: Arc<dyn ThreadsClient>,
        store: Arc<ThreadStore>,
        cache: Arc<ThreadListCache>,
        enabled: bool,
        threshold: usize,
    ) -> Self {
        Self {
            client,
            store,
            cache,
            enabled,
            threshold,
        }
    }

    /// Start name generation for `thread_id` if it qualifies.
    ///
    /// Returns the background task, or `None` when nothing was started.
    pub fn maybe_generate(&self, thread_id: &str) -> Option<JoinHandle<()>> {
        if !self.enabled {
            return None;
        }
        let thread = self.store.thread(thread_id)?;
        if !should_generate_name(&thread, self.threshold, self.store.name_requested(thread_id)) {
            return None;
        }
        if !self.store.mark_name_requested(thread_id) {
            return None;
        }

        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        let thread_id = thread_id.to_string();
        let context_key = thread.context_key.clone();

        Some(tokio::spawn(async move {
            match client.generate_name(&thread_id).await {
                Ok(summary) => {
                    let Some(name) = summary.name else {
                        tracing::warn!(thread_id = %thread_id, "Server returned no thread name");
                        return;
                    };
                    tracing::info!(thread_id = %thread_id, name = %name, "Thread named");
                    store.rename(&thread_id, &name);
                    cache.apply(
                        context_key.as_deref(),
                        ThreadListPatch::Rename {
                            thread_id: thread_id.clone(),
                            name,
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(thread_id = %thread_id, error = %e, "Thread name generation failed");
                }
            }
        }))
    }
}
