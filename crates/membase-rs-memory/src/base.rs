//! Object-safe interface shared by conversation memories.

use crate::{BufferedMemory, MemoryError, MemorySource, Message};
use std::path::Path;

/// Synchronous memory operations an agent can hold behind `dyn Memory`.
pub trait Memory: Send {
    /// Append one message; false when it was skipped as a duplicate.
    fn add(&mut self, message: Message) -> bool;

    /// Append several messages, returning how many were added.
    fn add_many(&mut self, messages: Vec<Message>) -> usize;

    /// The most recent `recent_n` messages (all when `None`), optionally filtered.
    fn get(
        &self,
        recent_n: Option<usize>,
        filter: Option<&dyn Fn(usize, &Message) -> bool>,
    ) -> Vec<Message>;

    /// Remove messages by position, returning how many were removed.
    fn delete(&mut self, positions: &[usize]) -> usize;

    fn load(&mut self, source: MemorySource, overwrite: bool) -> Result<usize, MemoryError>;

    fn export_to(&self, path: &Path) -> Result<(), MemoryError>;

    fn export_to_memory(&self) -> Vec<Message>;

    fn clear(&mut self);

    fn size(&self) -> usize;
}

impl Memory for BufferedMemory {
    fn add(&mut self, message: Message) -> bool {
        BufferedMemory::add(self, message)
    }

    fn add_many(&mut self, messages: Vec<Message>) -> usize {
        BufferedMemory::add_many(self, messages)
    }

    fn get(
        &self,
        recent_n: Option<usize>,
        filter: Option<&dyn Fn(usize, &Message) -> bool>,
    ) -> Vec<Message> {
        BufferedMemory::get(self, recent_n, filter)
    }

    fn delete(&mut self, positions: &[usize]) -> usize {
        BufferedMemory::delete(self, positions.iter().copied())
    }

    fn load(&mut self, source: MemorySource, overwrite: bool) -> Result<usize, MemoryError> {
        BufferedMemory::load(self, source, overwrite)
    }

    fn export_to(&self, path: &Path) -> Result<(), MemoryError> {
        BufferedMemory::export_to(self, path)
    }

    fn export_to_memory(&self) -> Vec<Message> {
        BufferedMemory::export_to_memory(self)
    }

    fn clear(&mut self) {
        BufferedMemory::clear(self)
    }

    fn size(&self) -> usize {
        BufferedMemory::size(self)
    }
}
