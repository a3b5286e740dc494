//! Thread Events
//!
//! Change notifications published by the thread store. Observers subscribe
//! through `ThreadProvider::subscribe` and receive every event emitted after
//! subscribing; slow receivers lag and skip ahead.

use serde::Serialize;
use threadline_core::{GenerationStage, Message};
use tokio::sync::broadcast;

/// A change to thread state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ThreadEvent {
    StageChanged {
        thread_id: String,
        from: GenerationStage,
        to: GenerationStage,
    },
    MessageAppended {
        thread_id: String,
        message: Message,
    },
    MessageUpdated {
        thread_id: String,
        message: Message,
    },
    /// The server assigned a real id to a locally started thread
    ThreadCreated {
        previous_id: String,
        thread_id: String,
    },
    ThreadSwitched {
        thread_id: String,
    },
    NameGenerationRequested {
        thread_id: String,
    },
    ThreadRenamed {
        thread_id: String,
        name: String,
    },
}

impl ThreadEvent {
    /// Thread the event refers to.
    pub fn thread_id(&self) -> &str {
        match self {
            ThreadEvent::StageChanged { thread_id, .. }
            | ThreadEvent::MessageAppended { thread_id, .. }
            | ThreadEvent::MessageUpdated { thread_id, .. }
            | ThreadEvent::ThreadCreated { thread_id, .. }
            | ThreadEvent::ThreadSwitched { thread_id }
            | ThreadEvent::NameGenerationRequested { thread_id }
            | ThreadEvent::ThreadRenamed { thread_id, .. } => thread_id,
        }
    }
}

/// Broadcast bus for `ThreadEvent`s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ThreadEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ThreadEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ThreadEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
