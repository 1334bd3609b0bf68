use async_trait::async_trait;
use membase_rs_memory::ConversationHub;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Upload recorded by [`RecordingHub`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub owner: String,
    pub filename: String,
    pub payload: String,
}

/// In-memory hub that records mirrored uploads and serves canned conversations.
#[derive(Default)]
pub struct RecordingHub {
    uploads: Mutex<Vec<RecordedUpload>>,
    conversations: Mutex<HashMap<String, Vec<String>>>,
    listing: Mutex<Option<Vec<String>>>,
    fetches: AtomicUsize,
    lists: AtomicUsize,
}

impl RecordingHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `records` for `conversation_id` and include it in listings.
    pub fn with_conversation(self, conversation_id: &str, records: Vec<String>) -> Self {
        self.conversations
            .lock()
            .insert(conversation_id.to_string(), records);
        self.listing
            .lock()
            .get_or_insert_with(Vec::new)
            .push(conversation_id.to_string());
        self
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().clone()
    }

    pub fn uploaded_filenames(&self) -> Vec<String> {
        self.uploads
            .lock()
            .iter()
            .map(|upload| upload.filename.clone())
            .collect()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversationHub for RecordingHub {
    fn mirror_upload(&self, owner: &str, filename: &str, payload: String) {
        self.uploads.lock().push(RecordedUpload {
            owner: owner.to_string(),
            filename: filename.to_string(),
            payload,
        });
    }

    async fn list_conversations(&self, _owner: &str) -> Option<Vec<String>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.listing.lock().clone()
    }

    async fn get_conversation(&self, _owner: &str, conversation_id: &str) -> Option<Vec<String>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.conversations.lock().get(conversation_id).cloned()
    }
}
