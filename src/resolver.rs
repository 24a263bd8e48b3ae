//! Session resolution: map (user, topic) to its backing chat
//!
//! The topic string is the only key the user supplies; there is no explicit
//! session id. At most one chat per (user, topic) is treated as current:
//! when races have created several, the most recently updated one wins and
//! the rest stay orphaned in the store (never garbage-collected here).
//!
//! Resolution never creates a chat. Creation is deferred to the first sent
//! message so that topics the user merely typed and abandoned leave nothing
//! behind.

use crate::store::{ChatStore, StoreResult};
use crate::types::{ChatId, UserId};

/// Outcome of find-or-create on the send path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub chat_id: ChatId,
    pub is_new: bool,
}

/// Find the current chat for (user, topic), if one exists.
///
/// Latest `updated_at` wins; duplicates are ignored.
pub async fn resolve<S: ChatStore>(
    store: &S,
    user_id: &UserId,
    topic: &str,
) -> StoreResult<Option<ChatId>> {
    let found = store.find_latest_chat(user_id, topic).await?;
    Ok(found.map(|record| record.id))
}

/// Find the current chat for (user, topic), creating one if none exists.
///
/// Only the send path calls this; mere topic selection uses [`resolve`].
pub async fn ensure<S: ChatStore>(
    store: &S,
    user_id: &UserId,
    topic: &str,
) -> StoreResult<Resolution> {
    if let Some(chat_id) = resolve(store, user_id, topic).await? {
        return Ok(Resolution { chat_id, is_new: false });
    }
    let chat_id = store.insert_chat(user_id, topic).await?;
    Ok(Resolution { chat_id, is_new: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryChatStore;

    #[tokio::test]
    async fn test_resolve_returns_none_without_creating() {
        let store = MemoryChatStore::new();
        let user = UserId::from_string("u1");

        let found = resolve(&store, &user, "Quantum Physics").await.unwrap();
        assert!(found.is_none());
        assert_eq!(store.chat_count(), 0);
    }

    #[tokio::test]
    async fn test_ensure_creates_once_then_reuses() {
        let store = MemoryChatStore::new();
        let user = UserId::from_string("u1");

        let first = ensure(&store, &user, "Quantum Physics").await.unwrap();
        assert!(first.is_new);

        let second = ensure(&store, &user, "Quantum Physics").await.unwrap();
        assert!(!second.is_new);
        assert_eq!(first.chat_id, second.chat_id);
        assert_eq!(store.chat_count(), 1);
    }

    #[tokio::test]
    async fn test_resolve_picks_most_recently_updated_duplicate() {
        let store = MemoryChatStore::new();
        let user = UserId::from_string("u1");

        let _older = store.insert_chat(&user, "Physics").await.unwrap();
        let newer = store.insert_chat(&user, "Physics").await.unwrap();

        let found = resolve(&store, &user, "Physics").await.unwrap();
        assert_eq!(found, Some(newer));
    }

    #[tokio::test]
    async fn test_resolution_is_per_user() {
        let store = MemoryChatStore::new();
        let alice = UserId::from_string("alice");
        let bob = UserId::from_string("bob");

        store.insert_chat(&alice, "Physics").await.unwrap();
        let found = resolve(&store, &bob, "Physics").await.unwrap();
        assert!(found.is_none());
    }
}
