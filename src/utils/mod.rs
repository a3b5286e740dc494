//! Utilities
//!
//! Error types and the trailing debouncer used by component-state sync.

pub mod debounce;
pub mod error;

pub use debounce::{DebounceAction, Debouncer};
pub use error::*;
