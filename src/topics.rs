//! Topic index: cached summary of a user's known topics
//!
//! Purely a cache over the user's chat documents, ordered by last activity.
//! Never authoritative: rebuilt from the store on refresh, mutated
//! optimistically between refreshes (touch on send, remove after a
//! confirmed delete), and cleared synchronously when the identity goes
//! away so no cross-user data lingers in memory.

use std::collections::HashMap;

use crate::types::{ChatId, ChatRecord, TopicEntry};

/// In-memory index of topic entries, most recently updated first
#[derive(Debug, Default)]
pub struct TopicIndex {
    entries: Vec<TopicEntry>,
}

impl TopicIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries ordered by `last_updated` descending
    pub fn entries(&self) -> &[TopicEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Look up the entry for an exact topic string
    pub fn get(&self, topic: &str) -> Option<&TopicEntry> {
        self.entries.iter().find(|e| e.topic == topic)
    }

    /// Rebuild the index from a fresh chat listing.
    ///
    /// Duplicate chats for one topic collapse to the most recently updated
    /// one; the rest are ignored, matching session resolution.
    pub fn rebuild(&mut self, chats: Vec<ChatRecord>) {
        let mut best: HashMap<String, TopicEntry> = HashMap::new();
        for chat in chats {
            let entry = TopicEntry {
                topic: chat.topic.clone(),
                chat_id: chat.id,
                last_updated: chat.updated_at,
            };
            match best.get(&chat.topic) {
                Some(existing) if existing.last_updated >= entry.last_updated => {}
                _ => {
                    best.insert(chat.topic, entry);
                }
            }
        }
        self.entries = best.into_values().collect();
        self.sort();
    }

    /// Optimistically bump an entry's last activity without a round trip.
    ///
    /// Reconciled on the next rebuild; unknown chat ids are ignored.
    pub fn touch(&mut self, chat_id: &ChatId, at: i64) {
        if let Some(entry) = self.entries.iter_mut().find(|e| &e.chat_id == chat_id) {
            entry.last_updated = entry.last_updated.max(at);
            self.sort();
        }
    }

    /// Evict an entry after a confirmed remote deletion
    pub fn remove(&mut self, chat_id: &ChatId) {
        self.entries.retain(|e| &e.chat_id != chat_id);
    }

    /// Drop everything (identity became absent)
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn sort(&mut self) {
        self.entries.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;

    fn chat(id: &str, topic: &str, updated_at: i64) -> ChatRecord {
        ChatRecord {
            id: ChatId::from_string(id),
            user_id: UserId::from_string("u1"),
            topic: topic.to_string(),
            created_at: 0,
            updated_at,
        }
    }

    #[test]
    fn test_rebuild_orders_by_last_updated_desc() {
        let mut index = TopicIndex::new();
        index.rebuild(vec![
            chat("c1", "Biology", 10),
            chat("c2", "Physics", 30),
            chat("c3", "History", 20),
        ]);

        let topics: Vec<&str> = index.entries().iter().map(|e| e.topic.as_str()).collect();
        assert_eq!(topics, ["Physics", "History", "Biology"]);
    }

    #[test]
    fn test_rebuild_collapses_duplicate_topics() {
        let mut index = TopicIndex::new();
        index.rebuild(vec![
            chat("c1", "Physics", 10),
            chat("c2", "Physics", 40),
            chat("c3", "Physics", 25),
        ]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.get("Physics").unwrap().chat_id.as_str(), "c2");
    }

    #[test]
    fn test_topics_are_distinct_under_exact_equality() {
        let mut index = TopicIndex::new();
        index.rebuild(vec![
            chat("c1", "Physics", 10),
            chat("c2", "physics ", 20),
        ]);

        assert_eq!(index.len(), 2);
        assert!(index.get("Physics").is_some());
        assert!(index.get("physics ").is_some());
    }

    #[test]
    fn test_touch_resorts_and_ignores_unknown() {
        let mut index = TopicIndex::new();
        index.rebuild(vec![
            chat("c1", "Biology", 10),
            chat("c2", "Physics", 30),
        ]);

        index.touch(&ChatId::from_string("c1"), 50);
        assert_eq!(index.entries()[0].topic, "Biology");

        // Unknown id is a no-op
        index.touch(&ChatId::from_string("nope"), 99);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_touch_never_moves_time_backwards() {
        let mut index = TopicIndex::new();
        index.rebuild(vec![chat("c1", "Biology", 100)]);

        index.touch(&ChatId::from_string("c1"), 50);
        assert_eq!(index.get("Biology").unwrap().last_updated, 100);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut index = TopicIndex::new();
        index.rebuild(vec![
            chat("c1", "Biology", 10),
            chat("c2", "Physics", 30),
        ]);

        index.remove(&ChatId::from_string("c2"));
        assert_eq!(index.len(), 1);

        index.clear();
        assert!(index.is_empty());
    }
}
