//! Threadline Client
//!
//! Interface to the remote thread service:
//! - `ThreadsClient` - the endpoint trait the control loop drives
//! - `ComponentStateStore` - narrow trait for message-state writes
//! - `HttpThreadsClient` - reqwest implementation (JSON + SSE/NDJSON streams)
//! - `StreamChunkDecoder` - line decoder for advance streams
//!
//! Also includes the wire DTOs and the HTTP client factory.

pub mod http;
pub mod http_client;
pub mod provider;
pub mod streaming;
pub mod types;

// Re-export main types
pub use http::HttpThreadsClient;
pub use http_client::build_http_client;
pub use provider::{parse_http_error, ChunkStream, ClientStateStore, ComponentStateStore, ThreadsClient};
pub use streaming::StreamChunkDecoder;
pub use types::*;
