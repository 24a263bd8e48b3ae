//! Core data model: IDs, roles, messages, chat records
//!
//! Topics are raw user-entered strings and act as partition keys. They are
//! compared by exact equality (case- and whitespace-sensitive); "Physics"
//! and "physics " are distinct partitions and are never normalized here.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to define a type-safe ID newtype
macro_rules! define_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Create from an existing string (for loading from the store)
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the inner string value
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(ChatId, "Unique identifier for a chat session document");
define_id!(MessageId, "Unique identifier for a message within a chat");
define_id!(UserId, "Opaque identifier for a signed-in user");

/// Current time as milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Who authored a message. Serialized with the store's wire tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "ai")]
    Ai,
}

/// A single transcript message.
///
/// Immutable after creation. The `topic` field is denormalized and only
/// carried on user-role messages; assistant messages leave it empty.
/// The wire shape matches the store's message documents:
/// `{type, text, topic?, timestamp}` (the id is the document id).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(skip)]
    pub id: MessageId,
    #[serde(rename = "type")]
    pub role: Role,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(rename = "timestamp")]
    pub created_at: i64,
}

impl Message {
    /// Create a user message with a fresh local id and local timestamp
    pub fn user(text: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::User,
            text: text.into(),
            topic: Some(topic.into()),
            created_at: now_millis(),
        }
    }

    /// Create an assistant message with a fresh local id and local timestamp
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Ai,
            text: text.into(),
            topic: None,
            created_at: now_millis(),
        }
    }
}

/// A chat session document: one per (user, topic), owned by the store.
///
/// Wire shape: `{userId, topic, createdAt, updatedAt}` with the id as the
/// document id. `updated_at` is touched on every persisted message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    #[serde(skip)]
    pub id: ChatId,
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub topic: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

/// Cached summary of one known topic. Derived from `ChatRecord`s, never
/// authoritative; rebuilt from the store on refresh.
#[derive(Clone, Debug, PartialEq)]
pub struct TopicEntry {
    pub topic: String,
    pub chat_id: ChatId,
    pub last_updated: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_creation() {
        let id1 = ChatId::new();
        let id2 = ChatId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_id_from_string() {
        let id = MessageId::from_string("msg-123");
        assert_eq!(id.as_str(), "msg-123");
    }

    #[test]
    fn test_user_message_carries_topic() {
        let msg = Message::user("What is superposition?", "Quantum Physics");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.topic.as_deref(), Some("Quantum Physics"));
    }

    #[test]
    fn test_assistant_message_has_no_topic() {
        let msg = Message::assistant("Superposition is...");
        assert_eq!(msg.role, Role::Ai);
        assert!(msg.topic.is_none());
    }

    #[test]
    fn test_message_wire_format() {
        let mut msg = Message::user("hello", "Biology");
        msg.created_at = 42;
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "user",
                "text": "hello",
                "topic": "Biology",
                "timestamp": 42,
            })
        );

        let mut ai = Message::assistant("hi");
        ai.created_at = 43;
        let json = serde_json::to_value(&ai).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "ai",
                "text": "hi",
                "timestamp": 43,
            })
        );
    }

    #[test]
    fn test_chat_record_wire_format() {
        let record = ChatRecord {
            id: ChatId::from_string("chat-1"),
            user_id: UserId::from_string("u1"),
            topic: "Physics".to_string(),
            created_at: 1,
            updated_at: 2,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "userId": "u1",
                "topic": "Physics",
                "createdAt": 1,
                "updatedAt": 2,
            })
        );
    }
}
