//! Conversational memory for membase agents.
//!
//! Messages live in per-conversation buffers that can mirror every write to
//! the hub upload queue and be hydrated back from the hub.

pub mod base;
pub mod buffered;
pub mod error;
pub mod hub;
pub mod message;
pub mod multi;

/// Trait object view over a conversation memory.
pub use base::Memory;
/// Conversation memory and its load sources.
pub use buffered::{BufferedMemory, MemorySource};
/// Memory error type.
pub use error::MemoryError;
/// Hub seam used for mirroring and preloading.
pub use hub::ConversationHub;
/// Memory unit model.
pub use message::{Message, MessageRole, MessageUrl};
/// Multi-conversation registry.
pub use multi::{MultiMemory, MultiMemoryBuilder};
