//! Trailing Debouncer
//!
//! Collapses a burst of values into one asynchronous action that runs with
//! the latest value once the input has been quiet for `delay`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::task::JoinHandle;

/// Async action run with the settled value.
pub type DebounceAction<V> = Arc<dyn Fn(V) -> BoxFuture<'static, ()> + Send + Sync>;

struct Pending<V> {
    value: Option<V>,
    timer: Option<JoinHandle<()>>,
    epoch: u64,
}

struct Inner<V> {
    delay: Duration,
    action: DebounceAction<V>,
    pending: Mutex<Pending<V>>,
}

/// Trailing-edge debouncer.
///
/// Dropping a debouncer with a pending value runs the action on the current
/// Tokio runtime, if there is one.
pub struct Debouncer<V: Send + 'static> {
    inner: Arc<Inner<V>>,
}

impl<V: Send + 'static> Debouncer<V> {
    pub fn new(delay: Duration, action: DebounceAction<V>) -> Self {
        Self {
            inner: Arc::new(Inner {
                delay,
                action,
                pending: Mutex::new(Pending {
                    value: None,
                    timer: None,
                    epoch: 0,
                }),
            }),
        }
    }

    /// Record `value` and restart the quiet window.
    pub fn call(&self, value: V) {
        let mut pending = self.inner.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.value = Some(value);
        pending.epoch += 1;
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }

        let inner = Arc::clone(&self.inner);
        let epoch = pending.epoch;
        pending.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;
            let value = {
                let mut pending = inner.pending.lock().unwrap_or_else(|e| e.into_inner());
                if pending.epoch != epoch {
                    return;
                }
                // Detach before running so a later call cannot abort the action.
                pending.timer = None;
                pending.value.take()
            };
            if let Some(value) = value {
                (inner.action)(value).await;
            }
        }));
    }

    /// Run the pending action now, if any, and wait for it.
    pub async fn flush(&self) {
        let value = self.take_pending();
        if let Some(value) = value {
            (self.inner.action)(value).await;
        }
    }

    /// Drop the pending value without running the action.
    pub fn cancel(&self) {
        drop(self.take_pending());
    }

    /// Whether a value is waiting for the quiet window to elapse.
    pub fn is_pending(&self) -> bool {
        let pending = self.inner.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.value.is_some()
    }

    fn take_pending(&self) -> Option<V> {
        let mut pending = self.inner.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.epoch += 1;
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }
        pending.value.take()
    }
}

impl<V: Send + 'static> Drop for Debouncer<V> {
    fn drop(&mut self) {
        let Some(value) = self.take_pending() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let action = Arc::clone(&self.inner.action);
                handle.spawn(async move { action(value).await });
            }
            Err(_) => {
                tracing::warn!("Debouncer dropped outside a runtime; pending action discarded");
            }
        }
    }
}
