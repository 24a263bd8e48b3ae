//! ChatStore trait for the remote document store
//!
//! The remote store keeps one `chats` collection keyed by (user, topic) with
//! a `messages` sub-collection per chat. This trait is domain-shaped over
//! that layout: callers never see collection paths or query builders, only
//! the operations the sync engine needs.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ChatId, ChatRecord, Message, MessageId, UserId};

/// Errors surfaced by a store backend
#[derive(Clone, Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or rejected the operation
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The referenced chat document does not exist
    #[error("chat not found: {0}")]
    NotFound(ChatId),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Async interface to the per-user chat document store
///
/// All reads and writes may fail with `StoreError::Unavailable`; callers
/// decide whether to roll back optimistic state or retain caches.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Create a chat document for (user, topic) with store-assigned id and
    /// timestamps. The store enforces no uniqueness: races can create
    /// duplicates, which resolution tie-breaks by `updated_at`.
    async fn insert_chat(&self, user_id: &UserId, topic: &str) -> StoreResult<ChatId>;

    /// Find the most recently updated chat for (user, topic), if any.
    ///
    /// Equality filters on both keys, ordered by `updated_at` descending,
    /// limited to one result. Topic matching is exact.
    async fn find_latest_chat(
        &self,
        user_id: &UserId,
        topic: &str,
    ) -> StoreResult<Option<ChatRecord>>;

    /// List every chat owned by the user (feeds topic index refresh)
    async fn list_chats(&self, user_id: &UserId) -> StoreResult<Vec<ChatRecord>>;

    /// Bump a chat's `updated_at` timestamp
    async fn touch_chat(&self, chat_id: &ChatId, at: i64) -> StoreResult<()>;

    /// Delete a chat and all messages in its sub-collection
    async fn delete_chat(&self, chat_id: &ChatId) -> StoreResult<()>;

    /// Append a message document to the chat's sub-collection
    async fn insert_message(&self, chat_id: &ChatId, message: Message) -> StoreResult<MessageId>;

    /// Fetch all messages for a chat, ordered by timestamp ascending
    async fn load_messages(&self, chat_id: &ChatId) -> StoreResult<Vec<Message>>;
}
