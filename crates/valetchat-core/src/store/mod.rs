//! Remote conversation store interface
//!
//! The realtime database and the object store are hosted services. This module
//! defines the thin client surface the synchronizers consume, plus the logical
//! path layout shared by every backend.
//!
//! ## Path layout
//!
//! ```text
//! users/{userId}                          -> {displayName, phoneNumber}
//! conversationIndex/{userId}/{messageId}  -> 1
//! messages/{messageId}                    -> {senderId, senderDisplayName, receiverId,
//!                                             sentAt, sentAtMillis, text|imageUrl|audioUrl}
//! ```
//!
//! Subscriptions are exposed as streams. Dropping the stream unsubscribes.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde_json::{Map, Value};
use url::Url;

use crate::error::{ChatError, ChatResult};
use crate::types::{MessageId, UserId};

/// Characters the hosted store forbids inside a key.
const FORBIDDEN_KEY_CHARS: &[char] = &['.', '#', '$', '[', ']', '/'];

/// A slash-separated location in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// The root of the store.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse `"a/b/c"`. Empty segments are ignored.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Path of a direct child.
    pub fn child(&self, key: impl AsRef<str>) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(
            key.as_ref()
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, or `None` for the root.
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl std::fmt::Display for StorePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Validate a single key segment.
pub fn validate_key(key: &str) -> ChatResult<()> {
    if key.is_empty() {
        return Err(ChatError::InvalidInput("empty store key".to_string()));
    }
    if let Some(c) = key.chars().find(|c| FORBIDDEN_KEY_CHARS.contains(c)) {
        return Err(ChatError::InvalidInput(format!(
            "store key {:?} contains forbidden character {:?}",
            key, c
        )));
    }
    Ok(())
}

/// Logical paths used by the chat client.
pub mod paths {
    use super::StorePath;
    use crate::types::{MessageId, UserId};

    pub const USERS: &str = "users";
    pub const CONVERSATION_INDEX: &str = "conversationIndex";
    pub const MESSAGES: &str = "messages";
    pub const IMAGES: &str = "images";
    pub const AUDIO: &str = "audio";

    pub fn users() -> StorePath {
        StorePath::parse(USERS)
    }

    pub fn user(id: &UserId) -> StorePath {
        users().child(id.as_str())
    }

    pub fn messages() -> StorePath {
        StorePath::parse(MESSAGES)
    }

    pub fn message(id: &MessageId) -> StorePath {
        messages().child(id.as_str())
    }

    pub fn conversation_index(user: &UserId) -> StorePath {
        StorePath::parse(CONVERSATION_INDEX).child(user.as_str())
    }
}

/// A child-added notification: key plus the child's value at delivery time.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildSnapshot {
    pub key: String,
    pub value: Value,
}

/// Stream of child-added events. Existing children are delivered first in key
/// order, then new children as they are created.
pub type ChildStream = BoxStream<'static, ChatResult<ChildSnapshot>>;

/// Stream of value snapshots: the current value first, then every change.
/// `None` means the node does not exist.
pub type ValueStream = BoxStream<'static, ChatResult<Option<Value>>>;

/// Realtime, hierarchically keyed database.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// One-shot read of the value at `path`.
    async fn read_once(&self, path: &StorePath) -> ChatResult<Option<Value>>;

    /// Subscribe to children added under `path`.
    fn observe_child_added(&self, path: &StorePath) -> ChildStream;

    /// Subscribe to the value at `path`.
    fn observe_value(&self, path: &StorePath) -> ValueStream;

    /// Atomically write every `{relative_path: value}` pair under `path`.
    ///
    /// Keys may span several segments (`"messages/abc"`), which makes a single
    /// call a multi-path update. `Value::Null` removes the node.
    async fn write_children(&self, path: &StorePath, children: Map<String, Value>)
        -> ChatResult<()>;

    /// Generate a unique, creation-ordered key for a new child of `path`.
    fn generate_key(&self, path: &StorePath) -> String;

    /// Whether `path/child_key` exists. Never writes.
    async fn exists(&self, path: &StorePath, child_key: &str) -> ChatResult<bool>;
}

/// Metadata of an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: StorePath,
    pub size: usize,
    pub content_type: String,
}

/// Binary object storage for media.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `bytes` to `path`.
    async fn put(&self, path: &StorePath, bytes: Bytes, content_type: &str)
        -> ChatResult<StoredObject>;

    /// Durable download URL of an uploaded object.
    async fn download_url(&self, path: &StorePath) -> ChatResult<Url>;
}

/// Decode a conversation-index child key into a message id.
pub fn index_entry_message_id(snapshot: &ChildSnapshot) -> ChatResult<MessageId> {
    validate_key(&snapshot.key)?;
    Ok(MessageId::new(snapshot.key.clone()))
}

/// Index entries written for one message: one per participant.
pub fn index_updates(message_id: &MessageId, participants: &[&UserId]) -> Map<String, Value> {
    let mut updates = Map::new();
    for user in participants {
        updates.insert(
            paths::conversation_index(user)
                .child(message_id.as_str())
                .to_string(),
            Value::from(1),
        );
    }
    updates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_parse_and_display() {
        let path = StorePath::parse("/conversationIndex//111/");
        assert_eq!(path.segments(), &["conversationIndex", "111"]);
        assert_eq!(path.to_string(), "conversationIndex/111");
        assert_eq!(path.key(), Some("111"));
        assert!(StorePath::root().is_root());
    }

    #[test]
    fn test_child_with_multi_segment_key() {
        let path = StorePath::root().child("messages/abc");
        assert_eq!(path, paths::message(&MessageId::new("abc")));
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("-Nabc123").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("a.b").is_err());
        assert!(validate_key("a/b").is_err());
    }

    #[test]
    fn test_index_updates_cover_both_participants() {
        let id = MessageId::new("m1");
        let a = UserId::new("111");
        let b = UserId::new("222");
        let updates = index_updates(&id, &[&a, &b]);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates["conversationIndex/111/m1"], 1);
        assert_eq!(updates["conversationIndex/222/m1"], 1);
    }
}
