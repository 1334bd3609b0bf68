//! Memory unit: one immutable conversation message.

use crate::error::MemoryError;
use chrono::Utc;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Timestamp format used on the wire, second resolution, UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Author role of a message.
///
/// Unknown roles are kept verbatim in [`MessageRole::Other`] and logged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageRole {
    System,
    #[default]
    User,
    Assistant,
    Other(String),
}

impl MessageRole {
    pub fn as_str(&self) -> &str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Other(role) => role,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, MessageRole::Other(_))
    }
}

impl From<String> for MessageRole {
    fn from(role: String) -> Self {
        match role.as_str() {
            "system" => MessageRole::System,
            "user" => MessageRole::User,
            "assistant" => MessageRole::Assistant,
            _ => {
                warn!("unknown message role (role={role})");
                MessageRole::Other(role)
            }
        }
    }
}

impl From<&str> for MessageRole {
    fn from(role: &str) -> Self {
        MessageRole::from(role.to_string())
    }
}

impl From<MessageRole> for String {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::Other(role) => role,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One URL or a list of URLs attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageUrl {
    One(String),
    Many(Vec<String>),
}

impl MessageUrl {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let urls: &[String] = match self {
            MessageUrl::One(url) => std::slice::from_ref(url),
            MessageUrl::Many(urls) => urls,
        };
        urls.iter().map(String::as_str)
    }
}

impl From<&str> for MessageUrl {
    fn from(url: &str) -> Self {
        MessageUrl::One(url.to_string())
    }
}

impl From<String> for MessageUrl {
    fn from(url: String) -> Self {
        MessageUrl::One(url)
    }
}

impl From<Vec<String>> for MessageUrl {
    fn from(urls: Vec<String>) -> Self {
        MessageUrl::Many(urls)
    }
}

/// A single conversation message.
///
/// The transfer form carries exactly `id`, `name`, `content`, `role`, `url`,
/// `metadata` and `timestamp`. Only `id` and `name` are required when decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: String,
    name: String,
    #[serde(default)]
    content: Value,
    #[serde(default)]
    role: MessageRole,
    #[serde(default)]
    url: Option<MessageUrl>,
    #[serde(default)]
    metadata: Option<Value>,
    #[serde(default = "now_timestamp")]
    timestamp: String,
}

impl Message {
    /// Create a message with a fresh id and the current timestamp.
    ///
    /// Content that cannot be represented as JSON is stored as its debug
    /// string and a warning is logged.
    pub fn new<C>(name: impl Into<String>, content: C, role: impl Into<MessageRole>) -> Self
    where
        C: Serialize + fmt::Debug,
    {
        let content = match serde_json::to_value(&content) {
            Ok(value) => value,
            Err(err) => {
                warn!("message content is not serializable, storing it as text (error={err})");
                Value::String(format!("{content:?}"))
            }
        };
        Self {
            id: Uuid::new_v4().simple().to_string(),
            name: name.into(),
            content,
            role: role.into(),
            url: None,
            metadata: None,
            timestamp: now_timestamp(),
        }
    }

    pub fn with_url(mut self, url: impl Into<MessageUrl>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &Value {
        &self.content
    }

    /// Content as text: strings verbatim, other values as compact JSON.
    pub fn content_text(&self) -> String {
        match &self.content {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }

    pub fn role(&self) -> &MessageRole {
        &self.role
    }

    pub fn url(&self) -> Option<&MessageUrl> {
        self.url.as_ref()
    }

    pub fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub(crate) fn take_metadata(&mut self) -> Option<Value> {
        self.metadata.take()
    }

    pub(crate) fn set_metadata(&mut self, metadata: Value) {
        self.metadata = Some(metadata);
    }

    pub fn to_transfer_form(&self) -> Result<Value, MemoryError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_transfer_form(value: Value) -> Result<Self, MemoryError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Serialize the transfer form to a JSON string.
    pub fn to_json(&self) -> Result<String, MemoryError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, MemoryError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Render as `name: content` followed by one `<url>` line per URL.
    pub fn formatted(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.content_text())?;
        if let Some(url) = &self.url {
            for url in url.iter() {
                write!(f, "\n<url>{url}</url>")?;
            }
        }
        Ok(())
    }
}

fn now_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::{Message, MessageRole, MessageUrl};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn new_message_has_compact_id_and_second_timestamp() {
        let message = Message::new("alice", "hello", "user");
        assert_eq!(message.id().len(), 32);
        assert!(!message.id().contains('-'));
        assert_eq!(message.timestamp().len(), 19);
        assert_eq!(message.timestamp().as_bytes()[10], b' ');
        assert_eq!(message.role(), &MessageRole::User);
    }

    #[test]
    fn transfer_form_has_exactly_the_wire_fields() {
        let message = Message::new("alice", json!({"text": "hi"}), MessageRole::Assistant)
            .with_url("https://example.com/a")
            .with_metadata(json!({"topic": "greeting"}));
        let form = message.to_transfer_form().expect("form");
        let keys: Vec<_> = form.as_object().expect("object").keys().cloned().collect();
        assert_eq!(
            keys.len(),
            7,
            "unexpected transfer form keys: {keys:?}"
        );
        for key in ["id", "name", "content", "role", "url", "metadata", "timestamp"] {
            assert!(form.get(key).is_some(), "missing {key}");
        }
        assert_eq!(form["role"], json!("assistant"));

        let restored = Message::from_transfer_form(form).expect("restore");
        assert_eq!(restored, message);
    }

    #[test]
    fn json_string_round_trip_preserves_timestamp() {
        let message = Message::new("bob", 42, "system");
        let text = message.to_json().expect("json");
        let restored = Message::from_json(&text).expect("restore");
        assert_eq!(restored.timestamp(), message.timestamp());
        assert_eq!(restored.content(), &json!(42));
    }

    #[test]
    fn unknown_roles_are_kept() {
        let message = Message::new("tool", "ok", "tool");
        assert_eq!(message.role(), &MessageRole::Other("tool".to_string()));
        assert!(!message.role().is_known());
        let form = message.to_transfer_form().expect("form");
        assert_eq!(form["role"], json!("tool"));
    }

    #[test]
    fn unserializable_content_is_coerced_to_text() {
        let mut content = BTreeMap::new();
        content.insert((1, 2), "tuple keys are not valid JSON object keys");
        let message = Message::new("alice", content, "user");
        assert!(message.content().is_string());
    }

    #[test]
    fn decoding_requires_only_id_and_name() {
        let message = Message::from_json(r#"{"id":"m1","name":"bob"}"#).expect("decode");
        assert_eq!(message.role(), &MessageRole::User);
        assert_eq!(message.url(), None);
        assert!(Message::from_json(r#"{"name":"bob"}"#).is_err());
    }

    #[test]
    fn formatted_lists_urls() {
        let message = Message::new("alice", "see these", "user")
            .with_url(MessageUrl::Many(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(message.formatted(), "alice: see these\n<url>a</url>\n<url>b</url>");
        let plain = Message::new("alice", json!({"k": 1}), "user");
        assert_eq!(plain.to_string(), r#"alice: {"k":1}"#);
    }
}
