//! Thread-List Cache
//!
//! Caches the server's thread list per context key. Local changes are applied
//! as explicit patch commands so readers see them immediately, and
//! `invalidate` marks an entry stale so the next fetch goes to the server.

use std::time::Duration;

use mini_moka::sync::Cache;
use threadline_client::ThreadSummary;

/// Cache key used when no context key is given.
pub const DEFAULT_CONTEXT_KEY: &str = "__default__";

#[derive(Debug, Clone)]
struct CacheEntry {
    threads: Vec<ThreadSummary>,
    stale: bool,
}

/// A local change to a cached thread list.
#[derive(Debug, Clone, PartialEq)]
pub enum ThreadListPatch {
    /// Add (or move to the front) a thread
    Insert(ThreadSummary),
    Rename { thread_id: String, name: String },
    Remove { thread_id: String },
}

impl ThreadListPatch {
    fn apply_to(self, threads: &mut Vec<ThreadSummary>) {
        match self {
            ThreadListPatch::Insert(summary) => {
                threads.retain(|t| t.id != summary.id);
                threads.insert(0, summary);
            }
            ThreadListPatch::Rename { thread_id, name } => {
                if let Some(thread) = threads.iter_mut().find(|t| t.id == thread_id) {
                    thread.name = Some(name);
                }
            }
            ThreadListPatch::Remove { thread_id } => {
                threads.retain(|t| t.id != thread_id);
            }
        }
    }
}

/// Per-context-key cache of thread lists.
pub struct ThreadListCache {
    cache: Cache<String, CacheEntry>,
}

impl ThreadListCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    fn key(context_key: Option<&str>) -> String {
        context_key.unwrap_or(DEFAULT_CONTEXT_KEY).to_string()
    }

    /// Cached list, stale or not.
    pub fn get(&self, context_key: Option<&str>) -> Option<Vec<ThreadSummary>> {
        self.cache.get(&Self::key(context_key)).map(|e| e.threads)
    }

    /// Cached list if it does not need a refetch.
    pub fn get_fresh(&self, context_key: Option<&str>) -> Option<Vec<ThreadSummary>> {
        self.cache
            .get(&Self::key(context_key))
            .filter(|e| !e.stale)
            .map(|e| e.threads)
    }

    /// Store a list fetched from the server.
    pub fn put(&self, context_key: Option<&str>, threads: Vec<ThreadSummary>) {
        self.cache.insert(
            Self::key(context_key),
            CacheEntry {
                threads,
                stale: false,
            },
        );
    }

    /// Apply a local change.
    ///
    /// An insert into an uncached key seeds a stale entry, so readers see the
    /// new thread while the next fetch still goes to the server.
    pub fn apply(&self, context_key: Option<&str>, patch: ThreadListPatch) {
        let key = Self::key(context_key);
        let entry = match self.cache.get(&key) {
            Some(mut entry) => {
                patch.apply_to(&mut entry.threads);
                entry
            }
            None => match patch {
                ThreadListPatch::Insert(summary) => CacheEntry {
                    threads: vec![summary],
                    stale: true,
                },
                _ => return,
            },
        };
        self.cache.insert(key, entry);
    }

    /// Mark a list stale without discarding it.
    pub fn invalidate(&self, context_key: Option<&str>) {
        let key = Self::key(context_key);
        if let Some(mut entry) = self.cache.get(&key) {
            entry.stale = true;
            self.cache.insert(key, entry);
        }
    }

    pub fn is_stale(&self, context_key: Option<&str>) -> bool {
        self.cache
            .get(&Self::key(context_key))
            .map(|e| e.stale)
            .unwrap_or(true)
    }

    /// Drop every cached list.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}
