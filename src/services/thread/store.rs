//! Thread Store
//!
//! Owns the local thread map and the current thread id. Every mutation goes
//! through `update`, which applies a closure under the lock and publishes the
//! resulting events after the lock is released. The lock is never held
//! across an await.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use serde_json::Value;
use threadline_core::{GenerationStage, Message, Thread, PLACEHOLDER_THREAD_ID};

use super::events::{EventBus, ThreadEvent};

struct StoreState {
    threads: HashMap<String, Thread>,
    current_thread_id: String,
    /// Threads for which name generation has been requested
    name_requested: HashSet<String>,
}

/// Local thread state shared by the provider and component-state handles.
pub struct ThreadStore {
    state: Mutex<StoreState>,
    events: EventBus,
}

impl ThreadStore {
    /// Create a store holding only the placeholder thread.
    pub fn new(events: EventBus) -> Self {
        let mut threads = HashMap::new();
        threads.insert(PLACEHOLDER_THREAD_ID.to_string(), Thread::placeholder());
        Self {
            state: Mutex::new(StoreState {
                threads,
                current_thread_id: PLACEHOLDER_THREAD_ID.to_string(),
                name_requested: HashSet::new(),
            }),
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn current_thread_id(&self) -> String {
        self.lock().current_thread_id.clone()
    }

    /// Snapshot of the current thread.
    pub fn current_thread(&self) -> Thread {
        let state = self.lock();
        state
            .threads
            .get(&state.current_thread_id)
            .cloned()
            .unwrap_or_else(|| Thread::new(state.current_thread_id.clone()))
    }

    /// Snapshot of a thread.
    pub fn thread(&self, thread_id: &str) -> Option<Thread> {
        self.lock().threads.get(thread_id).cloned()
    }

    /// Stage of a thread; unknown threads are idle.
    pub fn stage(&self, thread_id: &str) -> GenerationStage {
        self.lock()
            .threads
            .get(thread_id)
            .map(|t| t.generation_stage)
            .unwrap_or_default()
    }

    /// Snapshot of one message.
    pub fn message(&self, thread_id: &str, message_id: &str) -> Option<Message> {
        self.lock()
            .threads
            .get(thread_id)
            .and_then(|t| t.message(message_id).cloned())
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Apply `f` to a thread, creating it empty if missing, then publish the
    /// events it returns.
    pub fn update<R>(
        &self,
        thread_id: &str,
        f: impl FnOnce(&mut Thread) -> (R, Vec<ThreadEvent>),
    ) -> R {
        let (result, events) = {
            let mut state = self.lock();
            let thread = state
                .threads
                .entry(thread_id.to_string())
                .or_insert_with(|| Thread::new(thread_id));
            f(thread)
        };
        for event in events {
            self.events.publish(event);
        }
        result
    }

    /// Set the generation stage. Returns the previous stage.
    ///
    /// Transitions outside the expected lifecycle are logged and applied.
    pub fn set_stage(&self, thread_id: &str, stage: GenerationStage) -> GenerationStage {
        self.update(thread_id, |thread| {
            let from = thread.generation_stage;
            if from == stage {
                return (from, vec![]);
            }
            if !from.can_transition_to(stage) {
                tracing::warn!(
                    thread_id = %thread.id,
                    from = %from,
                    to = %stage,
                    "Unexpected generation stage transition"
                );
            }
            thread.generation_stage = stage;
            tracing::debug!(thread_id = %thread.id, stage = %stage, "Generation stage changed");
            (
                from,
                vec![ThreadEvent::StageChanged {
                    thread_id: thread.id.clone(),
                    from,
                    to: stage,
                }],
            )
        })
    }

    /// Replace the message with the same id, or append it.
    pub fn upsert_message(&self, thread_id: &str, message: Message) {
        self.update(thread_id, |thread| {
            let thread_id = thread.id.clone();
            let event_message = message.clone();
            let event = if thread.upsert_message(message) {
                ThreadEvent::MessageUpdated {
                    thread_id,
                    message: event_message,
                }
            } else {
                ThreadEvent::MessageAppended {
                    thread_id,
                    message: event_message,
                }
            };
            ((), vec![event])
        })
    }

    /// Set one key of a message's component state.
    ///
    /// Returns `false` when the message does not exist.
    pub fn patch_component_state(
        &self,
        thread_id: &str,
        message_id: &str,
        key: &str,
        value: Value,
    ) -> bool {
        self.update(thread_id, |thread| {
            let thread_id = thread.id.clone();
            match thread.messages.iter_mut().find(|m| m.id == message_id) {
                Some(message) => {
                    message.component_state.insert(key.to_string(), value);
                    let event = ThreadEvent::MessageUpdated {
                        thread_id,
                        message: message.clone(),
                    };
                    (true, vec![event])
                }
                None => (false, vec![]),
            }
        })
    }

    /// Attach an error to the latest message of a thread.
    pub fn set_latest_message_error(&self, thread_id: &str, error: &str) {
        self.update(thread_id, |thread| {
            let thread_id = thread.id.clone();
            match thread.messages.last_mut() {
                Some(message) => {
                    message.error = Some(error.to_string());
                    let event = ThreadEvent::MessageUpdated {
                        thread_id,
                        message: message.clone(),
                    };
                    ((), vec![event])
                }
                None => ((), vec![]),
            }
        })
    }

    /// Set a thread's name.
    pub fn rename(&self, thread_id: &str, name: &str) {
        self.update(thread_id, |thread| {
            thread.name = Some(name.to_string());
            (
                (),
                vec![ThreadEvent::ThreadRenamed {
                    thread_id: thread.id.clone(),
                    name: name.to_string(),
                }],
            )
        })
    }

    /// Record that a name has been requested for a thread.
    ///
    /// Returns `false` if it was already requested.
    pub fn mark_name_requested(&self, thread_id: &str) -> bool {
        let newly = self.lock().name_requested.insert(thread_id.to_string());
        if newly {
            self.events.publish(ThreadEvent::NameGenerationRequested {
                thread_id: thread_id.to_string(),
            });
        }
        newly
    }

    pub fn name_requested(&self, thread_id: &str) -> bool {
        self.lock().name_requested.contains(thread_id)
    }

    /// Move a locally started thread to the id the server assigned.
    ///
    /// Messages are re-homed, the placeholder is reset, and the current
    /// thread follows the move.
    pub fn rehome(&self, from: &str, to: &str) {
        if from == to {
            return;
        }
        let switched = {
            let mut state = self.lock();
            let mut thread = state
                .threads
                .remove(from)
                .unwrap_or_else(|| Thread::new(from));
            thread.id = to.to_string();
            for message in &mut thread.messages {
                message.thread_id = to.to_string();
            }
            if from == PLACEHOLDER_THREAD_ID {
                state
                    .threads
                    .insert(PLACEHOLDER_THREAD_ID.to_string(), Thread::placeholder());
            }
            state.threads.insert(to.to_string(), thread);

            let switched = state.current_thread_id == from;
            if switched {
                state.current_thread_id = to.to_string();
            }
            switched
        };

        tracing::info!(previous_id = %from, thread_id = %to, "Thread created");
        self.events.publish(ThreadEvent::ThreadCreated {
            previous_id: from.to_string(),
            thread_id: to.to_string(),
        });
        if switched {
            self.events.publish(ThreadEvent::ThreadSwitched {
                thread_id: to.to_string(),
            });
        }
    }

    /// Make a thread current, creating it empty if unknown locally.
    pub fn switch_to(&self, thread_id: &str) {
        {
            let mut state = self.lock();
            state
                .threads
                .entry(thread_id.to_string())
                .or_insert_with(|| Thread::new(thread_id));
            state.current_thread_id = thread_id.to_string();
        }
        self.events.publish(ThreadEvent::ThreadSwitched {
            thread_id: thread_id.to_string(),
        });
    }

    /// Reset the placeholder thread and make it current.
    pub fn start_new_thread(&self) {
        {
            let mut state = self.lock();
            state
                .threads
                .insert(PLACEHOLDER_THREAD_ID.to_string(), Thread::placeholder());
            state.current_thread_id = PLACEHOLDER_THREAD_ID.to_string();
        }
        self.events.publish(ThreadEvent::ThreadSwitched {
            thread_id: PLACEHOLDER_THREAD_ID.to_string(),
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
