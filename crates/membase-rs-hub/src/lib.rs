//! Hub storage client for membase.
//!
//! The client serializes all writes to the hub through a single-flight FIFO
//! upload queue and wraps idempotent reads in bounded exponential backoff.
//! Network access goes through the [`HubTransport`] trait so tests can script
//! hub behaviour without a live server.

mod client;
mod error;
mod queue;
mod retry;
mod transport;

/// Hub client facade and its status snapshot.
pub use client::{HubClient, HubStatus, UploadOutcome, resolve_bucket};
/// Error types for transport and hub operations.
pub use error::{HubError, TransportError};
/// Completion handle returned for queued uploads.
pub use queue::UploadHandle;
/// Transport abstraction and the reqwest-backed implementation.
pub use transport::{
    HttpMethod, HubRequest, HubResponse, HubTransport, RequestBody, ReqwestTransport,
};
/// Hub settings and retry policy from the config crate.
pub use membase_rs_config::{HubConfig, RetryConfig};
