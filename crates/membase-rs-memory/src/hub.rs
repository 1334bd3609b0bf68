//! Seam between conversation memories and hub storage.

use async_trait::async_trait;
use membase_rs_hub::HubClient;

/// Hub operations a memory needs for mirroring and preloading.
#[async_trait]
pub trait ConversationHub: Send + Sync {
    /// Queue a serialized message for upload without waiting.
    fn mirror_upload(&self, owner: &str, filename: &str, payload: String);

    /// Conversation ids stored for `owner`; `None` when unavailable.
    async fn list_conversations(&self, owner: &str) -> Option<Vec<String>>;

    /// Serialized messages of one conversation; `None` when unavailable.
    async fn get_conversation(&self, owner: &str, conversation_id: &str) -> Option<Vec<String>>;
}

#[async_trait]
impl ConversationHub for HubClient {
    fn mirror_upload(&self, owner: &str, filename: &str, payload: String) {
        // Non-blocking: failures are logged and counted by the client.
        let _handle = self.enqueue_upload(owner, filename, payload, None);
    }

    async fn list_conversations(&self, owner: &str) -> Option<Vec<String>> {
        HubClient::list_conversations(self, owner).await
    }

    async fn get_conversation(&self, owner: &str, conversation_id: &str) -> Option<Vec<String>> {
        HubClient::get_conversation(self, owner, conversation_id).await
    }
}
