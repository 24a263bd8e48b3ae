//! Transcript: the ordered message list for the active chat
//!
//! Append-only in-memory sequence with one explicit two-phase write path:
//! a user message is applied tentatively (visible at the tail before any
//! round trip), then either confirmed or rolled back. Rollback removes
//! exactly that tentative tail entry and never touches older, already
//! persisted messages.

use crate::types::{Message, MessageId};

/// In-memory message sequence for the active chat
///
/// Order always equals persisted timestamp order, except for the single
/// tentative tail entry while a send is in flight.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    pending: Option<MessageId>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// True while a tentative user message awaits confirm or rollback
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop all messages and any tentative state (topic switch, deletion)
    pub fn clear(&mut self) {
        self.messages.clear();
        self.pending = None;
    }

    /// Replace contents from a store load
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.pending = None;
    }

    /// Tentatively append a user message (phase one of the optimistic
    /// write). Visible immediately; must be followed by [`confirm`] or
    /// [`roll_back`].
    ///
    /// [`confirm`]: Transcript::confirm
    /// [`roll_back`]: Transcript::roll_back
    pub fn append_user(&mut self, text: &str, topic: &str) -> Message {
        let message = Message::user(text, topic);
        self.pending = Some(message.id.clone());
        self.messages.push(message.clone());
        message
    }

    /// Seal a tentative user message (phase two, success).
    ///
    /// Checked against the id returned by [`append_user`] so a finished
    /// send can never seal a newer send's tentative message.
    ///
    /// [`append_user`]: Transcript::append_user
    pub fn confirm(&mut self, id: &MessageId) {
        if self.pending.as_ref() == Some(id) {
            self.pending = None;
        }
    }

    /// Remove a tentative user message (phase two, failure).
    ///
    /// Only removes the tail entry, and only if it is still the tentative
    /// message identified by `id`; a transcript cleared by a topic switch
    /// makes this a no-op. Returns whether a message was removed.
    pub fn roll_back(&mut self, id: &MessageId) -> bool {
        if self.pending.as_ref() != Some(id) {
            return false;
        }
        self.pending = None;
        if self.messages.last().map(|m| &m.id) == Some(id) {
            self.messages.pop();
            return true;
        }
        false
    }

    /// Append an assistant message; only called after the answer service
    /// succeeded.
    pub fn append_assistant(&mut self, text: &str) -> Message {
        let message = Message::assistant(text);
        self.messages.push(message.clone());
        message
    }
}
