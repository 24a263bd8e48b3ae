//! In-memory ChatStore implementation
//!
//! Backs the engine tests and any run without a remote store configured.
//! Supports fault injection: `set_offline` fails every call until cleared,
//! `fail_next_write` fails exactly one mutating call.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::traits::{ChatStore, StoreError, StoreResult};
use crate::types::{ChatId, ChatRecord, Message, MessageId, UserId, now_millis};

/// In-memory chat store
///
/// Chats and their message sub-collections live in `Mutex<HashMap>`s keyed
/// by chat id. Server-assigned timestamps are strictly monotonic so that
/// "most recently updated wins" resolution is deterministic even when two
/// writes land in the same millisecond.
pub struct MemoryChatStore {
    chats: Mutex<HashMap<String, ChatRecord>>,
    messages: Mutex<HashMap<String, Vec<Message>>>,
    last_stamp: Mutex<i64>,
    offline: AtomicBool,
    fail_next_write: AtomicBool,
}

impl Default for MemoryChatStore {
    fn default() -> Self {
        Self {
            chats: Mutex::new(HashMap::new()),
            messages: Mutex::new(HashMap::new()),
            last_stamp: Mutex::new(0),
            offline: AtomicBool::new(false),
            fail_next_write: AtomicBool::new(false),
        }
    }
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail until `set_offline(false)`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make exactly the next mutating call fail
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    /// Number of chat documents currently stored (test inspection)
    pub fn chat_count(&self) -> usize {
        self.chats.lock().unwrap().len()
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("backend offline".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> StoreResult<()> {
        self.check_online()?;
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }

    /// Server-assigned timestamp, strictly increasing
    fn stamp(&self) -> i64 {
        let mut last = self.last_stamp.lock().unwrap();
        let now = now_millis().max(*last + 1);
        *last = now;
        now
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn insert_chat(&self, user_id: &UserId, topic: &str) -> StoreResult<ChatId> {
        self.check_write()?;
        let id = ChatId::new();
        let now = self.stamp();
        let record = ChatRecord {
            id: id.clone(),
            user_id: user_id.clone(),
            topic: topic.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.chats
            .lock()
            .unwrap()
            .insert(id.as_str().to_string(), record);
        self.messages
            .lock()
            .unwrap()
            .insert(id.as_str().to_string(), Vec::new());
        Ok(id)
    }

    async fn find_latest_chat(
        &self,
        user_id: &UserId,
        topic: &str,
    ) -> StoreResult<Option<ChatRecord>> {
        self.check_online()?;
        let chats = self.chats.lock().unwrap();
        let latest = chats
            .values()
            .filter(|c| &c.user_id == user_id && c.topic == topic)
            .max_by_key(|c| c.updated_at)
            .cloned();
        Ok(latest)
    }

    async fn list_chats(&self, user_id: &UserId) -> StoreResult<Vec<ChatRecord>> {
        self.check_online()?;
        let chats = self.chats.lock().unwrap();
        Ok(chats
            .values()
            .filter(|c| &c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn touch_chat(&self, chat_id: &ChatId, at: i64) -> StoreResult<()> {
        self.check_write()?;
        let mut chats = self.chats.lock().unwrap();
        let record = chats
            .get_mut(chat_id.as_str())
            .ok_or_else(|| StoreError::NotFound(chat_id.clone()))?;
        record.updated_at = record.updated_at.max(at).max(self.stamp());
        Ok(())
    }

    async fn delete_chat(&self, chat_id: &ChatId) -> StoreResult<()> {
        self.check_write()?;
        let removed = self.chats.lock().unwrap().remove(chat_id.as_str());
        if removed.is_none() {
            return Err(StoreError::NotFound(chat_id.clone()));
        }
        self.messages.lock().unwrap().remove(chat_id.as_str());
        Ok(())
    }

    async fn insert_message(&self, chat_id: &ChatId, message: Message) -> StoreResult<MessageId> {
        self.check_write()?;
        if !self.chats.lock().unwrap().contains_key(chat_id.as_str()) {
            return Err(StoreError::NotFound(chat_id.clone()));
        }
        let id = message.id.clone();
        self.messages
            .lock()
            .unwrap()
            .entry(chat_id.as_str().to_string())
            .or_default()
            .push(message);
        Ok(id)
    }

    async fn load_messages(&self, chat_id: &ChatId) -> StoreResult<Vec<Message>> {
        self.check_online()?;
        let messages = self.messages.lock().unwrap();
        let mut msgs = messages
            .get(chat_id.as_str())
            .cloned()
            .unwrap_or_default();
        // Stable sort: ties keep insertion order
        msgs.sort_by_key(|m| m.created_at);
        Ok(msgs)
    }
}
