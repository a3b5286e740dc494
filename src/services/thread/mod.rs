//! Thread Services
//!
//! Local thread state and the thread-advance loop:
//! - `store` - thread map, current thread, single update path
//! - `events` - broadcast change notifications
//! - `cache` - per-context-key thread lists with patch commands
//! - `naming` - background thread naming
//! - `provider` - `ThreadProvider`, the control loop

pub mod cache;
pub mod events;
pub mod naming;
pub mod provider;
pub mod store;

pub use cache::{ThreadListCache, ThreadListPatch, DEFAULT_CONTEXT_KEY};
pub use events::{EventBus, ThreadEvent};
pub use naming::{should_generate_name, ThreadNamer};
pub use provider::{ContextHelper, MessageInput, SendMessageOptions, ThreadProvider};
pub use store::ThreadStore;
