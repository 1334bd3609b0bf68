//! Error types for memory operations.

/// Errors returned by conversation memories and message codecs.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// A value that is not a message was offered to a memory.
    #[error("cannot add {0} to memory, expected a message object")]
    TypeMismatch(String),
    /// Neither a readable file nor inline JSON.
    #[error("failed to load memories: {0}")]
    Load(String),
}
