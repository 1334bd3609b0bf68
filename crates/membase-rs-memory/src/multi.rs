//! Registry of conversation memories keyed by conversation id.

use crate::buffered::BufferedMemory;
use crate::error::MemoryError;
use crate::hub::ConversationHub;
use crate::message::Message;
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Builder for [`MultiMemory`].
pub struct MultiMemoryBuilder {
    account: String,
    hub: Option<Arc<dyn ConversationHub>>,
    auto_upload: bool,
    default_conversation_id: Option<String>,
}

impl MultiMemoryBuilder {
    pub fn hub(mut self, hub: Arc<dyn ConversationHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Mirror every added message to the hub.
    pub fn auto_upload(mut self, enabled: bool) -> Self {
        self.auto_upload = enabled;
        self
    }

    pub fn default_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.default_conversation_id = Some(id.into());
        self
    }

    pub fn build(self) -> MultiMemory {
        let default_conversation_id = self
            .default_conversation_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(new_conversation_id);
        MultiMemory {
            memories: HashMap::new(),
            order: Vec::new(),
            account: self.account,
            hub: self.hub,
            auto_upload: self.auto_upload,
            default_conversation_id,
            preloaded: HashSet::new(),
        }
    }

    /// Build and hydrate every conversation the hub holds for the account.
    pub async fn build_preloaded(self) -> MultiMemory {
        let mut memory = self.build();
        memory.preload_all().await;
        memory
    }
}

/// Conversation memories of one account, created on first use.
pub struct MultiMemory {
    memories: HashMap<String, BufferedMemory>,
    order: Vec<String>,
    account: String,
    hub: Option<Arc<dyn ConversationHub>>,
    auto_upload: bool,
    default_conversation_id: String,
    preloaded: HashSet<String>,
}

impl std::fmt::Debug for MultiMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiMemory")
            .field("account", &self.account)
            .field("default_conversation_id", &self.default_conversation_id)
            .field("conversations", &self.order)
            .field("auto_upload", &self.auto_upload)
            .finish()
    }
}

impl MultiMemory {
    pub fn builder(account: impl Into<String>) -> MultiMemoryBuilder {
        MultiMemoryBuilder {
            account: account.into(),
            hub: None,
            auto_upload: false,
            default_conversation_id: None,
        }
    }

    /// Registry without hub access.
    pub fn new(account: impl Into<String>) -> Self {
        Self::builder(account).build()
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn default_conversation_id(&self) -> &str {
        &self.default_conversation_id
    }

    /// Switch the default conversation; `None` or empty picks a fresh id.
    pub fn update_conversation_id(&mut self, id: Option<&str>) {
        self.default_conversation_id = match id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => new_conversation_id(),
        };
        debug!(
            "default conversation updated (conversation_id={})",
            self.default_conversation_id
        );
    }

    /// Memory for `id` (default when `None`), created if missing.
    pub fn resolve(&mut self, id: Option<&str>) -> &mut BufferedMemory {
        let id = self.target_id(id);
        let account = &self.account;
        let hub = &self.hub;
        let auto_upload = self.auto_upload;
        let order = &mut self.order;
        self.memories.entry(id).or_insert_with_key(|id| {
            let mut memory = BufferedMemory::new(Some(id.as_str()), account.clone());
            if let Some(hub) = hub {
                memory = memory.with_hub(Arc::clone(hub), auto_upload);
            }
            debug!("conversation memory created (conversation_id={id})");
            order.push(id.clone());
            memory
        })
    }

    /// Look up an existing conversation without creating it.
    pub fn memory(&self, id: &str) -> Option<&BufferedMemory> {
        self.memories.get(id)
    }

    pub fn add(&mut self, message: Message, id: Option<&str>) -> bool {
        self.resolve(id).add(message)
    }

    pub fn add_many(
        &mut self,
        messages: impl IntoIterator<Item = Message>,
        id: Option<&str>,
    ) -> usize {
        self.resolve(id).add_many(messages)
    }

    pub fn add_value(&mut self, value: Value, id: Option<&str>) -> Result<usize, MemoryError> {
        self.resolve(id).add_value(value)
    }

    pub fn get(
        &mut self,
        id: Option<&str>,
        recent_n: Option<usize>,
        filter: Option<&dyn Fn(usize, &Message) -> bool>,
    ) -> Vec<Message> {
        self.resolve(id).get(recent_n, filter)
    }

    /// Delete positions from a conversation; unknown conversations are ignored.
    pub fn delete(&mut self, id: Option<&str>, positions: impl IntoIterator<Item = usize>) -> usize {
        let id = self.target_id(id);
        match self.memories.get_mut(&id) {
            Some(memory) => memory.delete(positions),
            None => 0,
        }
    }

    /// Clear one conversation, or everything when `id` is `None`.
    ///
    /// Clearing everything also picks a fresh default conversation id.
    pub fn clear(&mut self, id: Option<&str>) {
        match id {
            None => {
                self.memories.clear();
                self.order.clear();
                self.default_conversation_id = new_conversation_id();
                info!(
                    "all conversations cleared (account={}, default_conversation_id={})",
                    self.account, self.default_conversation_id
                );
            }
            Some(id) => {
                if let Some(memory) = self.memories.get_mut(id) {
                    memory.clear();
                }
            }
        }
    }

    /// Messages in one conversation, or across all when `id` is `None`.
    pub fn size(&self, id: Option<&str>) -> usize {
        match id {
            None => self.memories.values().map(BufferedMemory::size).sum(),
            Some(id) => self.memories.get(id).map_or(0, BufferedMemory::size),
        }
    }

    /// Conversation ids in creation order.
    pub fn conversations(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn is_preloaded(&self, id: &str) -> bool {
        self.preloaded.contains(id)
    }

    /// Hydrate one conversation from the hub, at most once per id.
    ///
    /// The id is marked before fetching, so a failed fetch is not retried by
    /// later calls. Returns the number of messages added.
    pub async fn preload_from(&mut self, id: &str) -> usize {
        if !self.preloaded.insert(id.to_string()) {
            debug!("conversation already preloaded (conversation_id={id})");
            return 0;
        }
        let Some(hub) = self.hub.clone() else {
            warn!("no hub configured, skipping preload (conversation_id={id})");
            return 0;
        };

        self.resolve(Some(id));
        let Some(records) = hub.get_conversation(&self.account, id).await else {
            warn!("conversation unavailable on hub (conversation_id={id})");
            return 0;
        };

        let memory = self.resolve(Some(id));
        let mut added = 0;
        for record in records {
            match decode_record(&record) {
                Ok(Some(message)) => {
                    if memory.add_with_upload(message, false) {
                        added += 1;
                    }
                }
                Ok(None) => debug!("hub record is not a message, skipping: {record}"),
                Err(err) => warn!("malformed hub record skipped (conversation_id={id}): {err}"),
            }
        }
        info!("conversation preloaded (conversation_id={id}, added={added})");
        added
    }

    /// Preload every conversation the hub lists for this account.
    pub async fn preload_all(&mut self) -> usize {
        let Some(hub) = self.hub.clone() else {
            warn!("no hub configured, skipping preload (account={})", self.account);
            return 0;
        };
        let Some(ids) = hub.list_conversations(&self.account).await else {
            warn!("conversation list unavailable (account={})", self.account);
            return 0;
        };
        let mut added = 0;
        for id in ids {
            added += self.preload_from(&id).await;
        }
        added
    }

    fn target_id(&self, id: Option<&str>) -> String {
        match id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.default_conversation_id.clone(),
        }
    }
}

fn new_conversation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Decode a hub record; `Ok(None)` when it lacks a non-empty `id` or `name`.
fn decode_record(record: &str) -> Result<Option<Message>, MemoryError> {
    let value: Value = serde_json::from_str(record)?;
    let has_field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(|field| !field.is_empty())
    };
    if !(has_field("id") && has_field("name")) {
        return Ok(None);
    }
    Message::from_transfer_form(value).map(Some)
}
