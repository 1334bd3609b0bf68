//! Test helpers shared across membase crates.

pub mod hub;
pub mod transport;

pub use hub::{RecordedUpload, RecordingHub};
pub use transport::{ScriptedTransport, SentRequest};
