//! Services
//!
//! Thread orchestration, component registration, and component-state sync.

pub mod component_state;
pub mod components;
pub mod thread;

pub use component_state::ComponentState;
pub use components::{ComponentDefinition, ComponentRegistry};
pub use thread::ThreadProvider;
