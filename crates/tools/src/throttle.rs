//! Keyed Throttle
//!
//! Leading + trailing rate limiter keyed by an arbitrary string. The first
//! value for an idle key fires immediately; values arriving during the
//! cooldown overwrite each other and the most recent one fires when the
//! cooldown expires, restarting it. A cooldown that elapses with nothing new
//! returns the key to idle.
//!
//! Each key owns one timer task. Timers carry the epoch of the entry that
//! spawned them, so a timer outliving a `flush()` never touches a newer entry
//! created for the same key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Callback invoked with the key and the value being fired.
pub type ThrottleCallback<V> = Arc<dyn Fn(&str, V) + Send + Sync>;

struct Entry<V> {
    latest: Option<V>,
    has_trailing: bool,
    timer: Option<JoinHandle<()>>,
    epoch: u64,
}

struct Inner<V> {
    cooldown: Duration,
    callback: ThrottleCallback<V>,
    entries: Mutex<HashMap<String, Entry<V>>>,
    next_epoch: AtomicU64,
}

/// Per-key leading/trailing throttle.
///
/// Requires a Tokio runtime for its timers.
pub struct KeyedThrottle<V: Send + 'static> {
    inner: Arc<Inner<V>>,
}

impl<V: Send + 'static> KeyedThrottle<V> {
    /// Create a throttle that fires `callback` at most once per `cooldown`
    /// window per key, plus one trailing fire.
    pub fn new(cooldown: Duration, callback: ThrottleCallback<V>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cooldown,
                callback,
                entries: Mutex::new(HashMap::new()),
                next_epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Cooldown window length.
    pub fn cooldown(&self) -> Duration {
        self.inner.cooldown
    }

    /// Submit a value for `key`.
    pub fn schedule(&self, key: &str, value: V) {
        {
            let mut entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = entries.get_mut(key) {
                entry.latest = Some(value);
                entry.has_trailing = true;
                return;
            }

            let epoch = self.inner.next_epoch.fetch_add(1, Ordering::Relaxed);
            let timer = tokio::spawn(run_timer(Arc::clone(&self.inner), key.to_string(), epoch));
            entries.insert(
                key.to_string(),
                Entry {
                    latest: None,
                    has_trailing: false,
                    timer: Some(timer),
                    epoch,
                },
            );
        }

        // Leading edge, outside the lock so the callback may re-enter.
        (self.inner.callback)(key, value);
    }

    /// Fire every pending trailing value now and cancel all timers.
    ///
    /// Calling it again with nothing scheduled in between is a no-op.
    pub fn flush(&self) {
        let pending: Vec<(String, V)> = {
            let mut entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries
                .drain()
                .filter_map(|(key, mut entry)| {
                    if let Some(timer) = entry.timer.take() {
                        timer.abort();
                    }
                    match (entry.has_trailing, entry.latest.take()) {
                        (true, Some(value)) => Some((key, value)),
                        _ => None,
                    }
                })
                .collect()
        };

        for (key, value) in pending {
            (self.inner.callback)(&key, value);
        }
    }

    /// Whether `key` is inside a cooldown window.
    pub fn is_active(&self, key: &str) -> bool {
        let entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.contains_key(key)
    }

    /// Whether `key` has a value waiting for the trailing edge.
    pub fn has_pending(&self, key: &str) -> bool {
        let entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).is_some_and(|entry| entry.has_trailing)
    }

    /// Number of keys inside a cooldown window.
    pub fn active_keys(&self) -> usize {
        let entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }
}

impl<V: Send + 'static> Drop for KeyedThrottle<V> {
    fn drop(&mut self) {
        let mut entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        for (_, mut entry) in entries.drain() {
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
        }
    }
}

async fn run_timer<V: Send + 'static>(inner: Arc<Inner<V>>, key: String, epoch: u64) {
    loop {
        tokio::time::sleep(inner.cooldown).await;

        let trailing = {
            let mut entries = inner.entries.lock().unwrap_or_else(|e| e.into_inner());
            let Some(entry) = entries.get_mut(&key) else {
                return;
            };
            if entry.epoch != epoch {
                return;
            }
            if !entry.has_trailing {
                entries.remove(&key);
                return;
            }
            entry.has_trailing = false;
            entry.latest.take()
        };

        if let Some(value) = trailing {
            (inner.callback)(&key, value);
        }
    }
}
