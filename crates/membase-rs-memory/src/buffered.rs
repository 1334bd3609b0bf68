//! Conversation memory: an ordered, deduplicated message buffer.

use crate::error::MemoryError;
use crate::hub::ConversationHub;
use crate::message::Message;
use log::{debug, info, warn};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Input accepted by [`BufferedMemory::load`].
#[derive(Debug, Clone)]
pub enum MemorySource {
    /// A file path, or inline JSON when no such file can be read.
    Text(String),
    Message(Message),
    Messages(Vec<Message>),
}

impl From<&str> for MemorySource {
    fn from(text: &str) -> Self {
        MemorySource::Text(text.to_string())
    }
}

impl From<String> for MemorySource {
    fn from(text: String) -> Self {
        MemorySource::Text(text)
    }
}

impl From<&Path> for MemorySource {
    fn from(path: &Path) -> Self {
        MemorySource::Text(path.to_string_lossy().into_owned())
    }
}

impl From<Message> for MemorySource {
    fn from(message: Message) -> Self {
        MemorySource::Message(message)
    }
}

impl From<Vec<Message>> for MemorySource {
    fn from(messages: Vec<Message>) -> Self {
        MemorySource::Messages(messages)
    }
}

/// Messages of one conversation, in insertion order.
///
/// Message ids are unique within the buffer; the `id -> position` index is
/// rebuilt after every deletion. When a hub is attached and auto upload is on,
/// every added message is queued for upload as `"{conversation_id}_{position}"`.
pub struct BufferedMemory {
    messages: Vec<Message>,
    index: HashMap<String, usize>,
    conversation_id: String,
    membase_account: String,
    hub: Option<Arc<dyn ConversationHub>>,
    auto_upload: bool,
}

impl std::fmt::Debug for BufferedMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedMemory")
            .field("conversation_id", &self.conversation_id)
            .field("membase_account", &self.membase_account)
            .field("size", &self.messages.len())
            .field("mirrors_to_hub", &self.mirrors_to_hub())
            .finish()
    }
}

impl BufferedMemory {
    /// Create an empty memory. A missing or empty id is replaced by a uuid.
    pub fn new(conversation_id: Option<&str>, membase_account: impl Into<String>) -> Self {
        let conversation_id = match conversation_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        Self {
            messages: Vec::new(),
            index: HashMap::new(),
            conversation_id,
            membase_account: membase_account.into(),
            hub: None,
            auto_upload: false,
        }
    }

    /// Attach a hub for mirroring added messages.
    pub fn with_hub(mut self, hub: Arc<dyn ConversationHub>, auto_upload: bool) -> Self {
        self.hub = Some(hub);
        self.auto_upload = auto_upload;
        self
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn membase_account(&self) -> &str {
        &self.membase_account
    }

    pub fn mirrors_to_hub(&self) -> bool {
        self.auto_upload && self.hub.is_some()
    }

    /// Add a message, mirroring it to the hub if configured.
    ///
    /// Returns `false` when a message with the same id is already present.
    pub fn add(&mut self, message: Message) -> bool {
        self.add_with_upload(message, true)
    }

    /// Add several messages; returns how many were new.
    pub fn add_many(&mut self, messages: impl IntoIterator<Item = Message>) -> usize {
        self.add_all(messages, true)
    }

    pub fn add_with_upload(&mut self, mut message: Message, upload: bool) -> bool {
        if self.index.contains_key(message.id()) {
            warn!(
                "duplicate message skipped (conversation_id={}, id={})",
                self.conversation_id,
                message.id()
            );
            return false;
        }

        let metadata = stamp_conversation(message.take_metadata(), &self.conversation_id);
        message.set_metadata(metadata);

        let position = self.messages.len();
        self.index.insert(message.id().to_string(), position);
        if upload {
            self.mirror(&message, position);
        }
        self.messages.push(message);
        true
    }

    /// Add a message or an array of messages given as dynamic JSON.
    ///
    /// Anything that does not decode as a message fails with `TypeMismatch`
    /// before the memory is modified.
    pub fn add_value(&mut self, value: Value) -> Result<usize, MemoryError> {
        let items = match value {
            Value::Array(items) => items,
            other => vec![other],
        };
        let mut messages = Vec::with_capacity(items.len());
        for item in items {
            if !item.is_object() {
                return Err(MemoryError::TypeMismatch(json_kind(&item).to_string()));
            }
            let message = Message::from_transfer_form(item)
                .map_err(|err| MemoryError::TypeMismatch(format!("object ({err})")))?;
            messages.push(message);
        }
        Ok(self.add_many(messages))
    }

    /// Remove the messages at the given positions.
    ///
    /// Out-of-range positions are skipped with a warning. Returns the number
    /// of removed messages.
    pub fn delete(&mut self, positions: impl IntoIterator<Item = usize>) -> usize {
        if self.messages.is_empty() {
            warn!(
                "memory is empty, skipping delete (conversation_id={})",
                self.conversation_id
            );
            return 0;
        }

        let size = self.messages.len();
        let (targets, invalid): (Vec<usize>, Vec<usize>) =
            positions.into_iter().partition(|position| *position < size);
        let targets: HashSet<usize> = targets.into_iter().collect();
        if !invalid.is_empty() {
            warn!(
                "skipping delete for invalid positions (conversation_id={}, positions={:?})",
                self.conversation_id, invalid
            );
        }

        let before = self.messages.len();
        let mut position = 0;
        self.messages.retain(|_| {
            let keep = !targets.contains(&position);
            position += 1;
            keep
        });
        self.rebuild_index();
        before - self.messages.len()
    }

    /// The most recent `recent_n` messages (all when `None`), optionally filtered.
    ///
    /// The filter receives the position within the returned window.
    pub fn get(
        &self,
        recent_n: Option<usize>,
        filter: Option<&dyn Fn(usize, &Message) -> bool>,
    ) -> Vec<Message> {
        let start = match recent_n {
            Some(count) => self.messages.len().saturating_sub(count),
            None => 0,
        };
        self.messages[start..]
            .iter()
            .enumerate()
            .filter(|(position, message)| filter.is_none_or(|filter| filter(*position, *message)))
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Write the memory to `path` as a pretty JSON array of serialized messages.
    pub fn export_to(&self, path: impl AsRef<Path>) -> Result<(), MemoryError> {
        let path = path.as_ref();
        let serialized = self
            .messages
            .iter()
            .map(Message::to_json)
            .collect::<Result<Vec<_>, _>>()?;
        fs::write(path, serde_json::to_string_pretty(&serialized)?)?;
        info!(
            "memory exported (conversation_id={}, path={}, messages={})",
            self.conversation_id,
            path.display(),
            serialized.len()
        );
        Ok(())
    }

    pub fn export_to_memory(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Load messages without mirroring them to the hub.
    ///
    /// Text is read as a file path first and parsed as inline JSON if that
    /// fails. Returns the number of messages added.
    pub fn load(
        &mut self,
        source: impl Into<MemorySource>,
        overwrite: bool,
    ) -> Result<usize, MemoryError> {
        let messages = match source.into() {
            MemorySource::Text(text) => parse_text_source(&text)?,
            MemorySource::Message(message) => vec![message],
            MemorySource::Messages(messages) => messages,
        };
        if overwrite {
            self.clear();
        }
        let added = self.add_all(messages, false);
        debug!(
            "memory loaded (conversation_id={}, added={added})",
            self.conversation_id
        );
        Ok(added)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.index.clear();
    }

    pub fn size(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Position of the message with the given id.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    fn add_all(&mut self, messages: impl IntoIterator<Item = Message>, upload: bool) -> usize {
        messages
            .into_iter()
            .map(|message| self.add_with_upload(message, upload))
            .filter(|added| *added)
            .count()
    }

    fn mirror(&self, message: &Message, position: usize) {
        if !self.auto_upload {
            return;
        }
        let Some(hub) = &self.hub else {
            return;
        };
        let filename = format!("{}_{}", self.conversation_id, position);
        match message.to_json() {
            Ok(payload) => {
                debug!(
                    "mirroring message to hub (owner={}, id={filename})",
                    self.membase_account
                );
                hub.mirror_upload(&self.membase_account, &filename, payload);
            }
            Err(err) => warn!("message not mirrored, serialization failed (id={filename}): {err}"),
        }
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .messages
            .iter()
            .enumerate()
            .map(|(position, message)| (message.id().to_string(), position))
            .collect();
    }
}

/// Attach the conversation id to message metadata.
///
/// Objects gain a `conversation` key, absent metadata becomes a fresh object
/// and any other value is wrapped as `{metadata, conversation}`.
fn stamp_conversation(metadata: Option<Value>, conversation_id: &str) -> Value {
    match metadata {
        Some(Value::Object(mut map)) => {
            map.insert(
                "conversation".to_string(),
                Value::String(conversation_id.to_string()),
            );
            Value::Object(map)
        }
        None | Some(Value::Null) => json!({ "conversation": conversation_id }),
        Some(other) => json!({ "metadata": other, "conversation": conversation_id }),
    }
}

fn parse_text_source(text: &str) -> Result<Vec<Message>, MemoryError> {
    match fs::read_to_string(text) {
        Ok(contents) => match parse_serialized(&contents) {
            Ok(messages) => return Ok(messages),
            Err(err) => debug!("file is not a message export, trying inline json: {err}"),
        },
        Err(err) => debug!("not a readable file, trying inline json: {err}"),
    }
    parse_serialized(text).map_err(|err| MemoryError::Load(err.to_string()))
}

/// Decode an array whose items are serialized messages or message objects.
fn parse_serialized(text: &str) -> Result<Vec<Message>, MemoryError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Array(items) = value else {
        return Err(MemoryError::Load(format!(
            "expected an array of messages, found {}",
            json_kind(&value)
        )));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(serialized) => Message::from_json(&serialized),
            other => Message::from_transfer_form(other),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
