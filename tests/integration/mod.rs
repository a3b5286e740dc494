//! Integration Tests Module
//!
//! End-to-end tests of the thread provider against scripted in-memory
//! clients: the thread-advance loop over both transports, cancellation,
//! thread creation and naming, and component-state sync.

// Scripted client and message builders
mod support;

// Thread-advance control loop tests
mod thread_advance_test;

// Component-state sync tests
mod component_state_test;
