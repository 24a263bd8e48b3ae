//! TutorEngine - orchestrates identity, topics, sessions, and the transcript
//!
//! This is the main API for driving a tutoring conversation. It coordinates:
//! - Identity changes (sign-in refreshes the topic index, sign-out clears it)
//! - Topic switches (resolve the backing chat, load its transcript)
//! - Message sends (optimistic append, lazy chat creation, persist, answer)
//! - Topic deletion (single or batch, with partial-failure accounting)
//!
//! All shared state lives behind one async mutex that is released across
//! store and answer-service round trips, so several operations can be in
//! flight at once. Every topic load carries a generation tag; a result is
//! applied only when the tag still matches, which is how a load triggered
//! by a later topic switch wins over a late-arriving stale one. There is
//! no hard cancellation: stale results are detected and dropped.

use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::answer::AnswerService;
use crate::error::EngineError;
use crate::resolver;
use crate::store::{ChatStore, StoreError};
use crate::topics::TopicIndex;
use crate::transcript::Transcript;
use crate::types::{ChatId, Message, MessageId, TopicEntry, UserId, now_millis};


/// Where the engine is in its lifecycle
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// No signed-in identity; transcripts are ephemeral
    NoIdentity,
    /// Signed in, no topic selected yet
    IdentityNoTopic,
    /// A topic switch is resolving and loading
    LoadingTopic { topic: String },
    /// Topic active; `chat_id` is `None` until the first message creates one
    TopicReady {
        topic: String,
        chat_id: Option<ChatId>,
    },
}

impl EngineState {
    /// The topic this state refers to, if any
    pub fn topic(&self) -> Option<&str> {
        match self {
            EngineState::LoadingTopic { topic } | EngineState::TopicReady { topic, .. } => {
                Some(topic)
            }
            _ => None,
        }
    }
}

/// Events emitted for UI consumption
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Topic index was rebuilt from the store
    TopicIndexRefreshed { topics: usize },
    /// Refresh failed; the previous cached index is retained
    TopicIndexRefreshFailed { error: String },
    /// Transcript for a topic finished loading
    TranscriptLoaded { topic: String, messages: usize },
    /// Resolution or transcript load failed for a topic
    LoadFailed { topic: String, error: String },
    /// User message was added (immediate UI feedback, still optimistic)
    UserMessageAdded(Message),
    /// Assistant answer arrived and was appended
    AssistantMessageAdded(Message),
    /// Send failed; the optimistic user message was rolled back
    MessageFailed { error: String },
    /// Batch deletion finished
    TopicsDeleted { deleted: usize, failed: usize },
}

/// Outcome of a batch topic deletion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

struct EngineInner {
    state: EngineState,
    identity: Option<UserId>,
    /// Topic the user currently composes against. Survives sign-out so the
    /// user can keep chatting ephemerally, unlike `state` which drops to
    /// `NoIdentity`.
    topic: Option<String>,
    /// Backing chat for the active topic, once resolved or created
    chat_id: Option<ChatId>,
    /// Topic whose transcript is loaded; re-selecting it is a no-op
    loaded_topic: Option<String>,
    /// Bumped on every topic switch and identity change; in-flight results
    /// with an older tag are discarded
    generation: u64,
    transcript: Transcript,
    topics: TopicIndex,
    event_tx: Option<mpsc::UnboundedSender<EngineEvent>>,
}

impl EngineInner {
    fn emit(&self, event: EngineEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}

/// Chat-session/topic synchronization engine
///
/// Generic over the store and answer-service seams so tests can inject
/// in-memory fakes. Construct once per UI surface and share via `Arc`.
pub struct TutorEngine<S: ChatStore, A: AnswerService> {
    store: Arc<S>,
    answers: Arc<A>,
    inner: Mutex<EngineInner>,
}

impl<S: ChatStore, A: AnswerService> TutorEngine<S, A> {
    pub fn new(store: Arc<S>, answers: Arc<A>) -> Self {
        Self {
            store,
            answers,
            inner: Mutex::new(EngineInner {
                state: EngineState::NoIdentity,
                identity: None,
                topic: None,
                chat_id: None,
                loaded_topic: None,
                generation: 0,
                transcript: Transcript::new(),
                topics: TopicIndex::new(),
                event_tx: None,
            }),
        }
    }

    /// Subscribe to engine events. Replaces any previous subscriber.
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<EngineEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().await.event_tx = Some(tx);
        rx
    }

    // ========== Identity ==========

    /// React to the identity provider's current user changing.
    ///
    /// Sign-in refreshes the topic index and reloads the current topic if
    /// one is selected; failures there are reported via events, not
    /// returned. Sign-out synchronously clears the index and the session
    /// binding but leaves the local transcript as-is.
    pub async fn set_identity(&self, identity: Option<UserId>) {
        let signed_in = identity.is_some();
        let resume_topic = {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            inner.chat_id = None;
            inner.loaded_topic = None;
            match identity {
                Some(user) => {
                    if inner.identity.as_ref() != Some(&user) {
                        // entries from a previous identity must not survive
                        inner.topics.clear();
                    }
                    inner.identity = Some(user);
                    inner.state = EngineState::IdentityNoTopic;
                    inner.topic.clone()
                }
                None => {
                    inner.identity = None;
                    inner.topics.clear();
                    inner.state = EngineState::NoIdentity;
                    None
                }
            }
        };

        if signed_in {
            if let Err(err) = self.refresh_topics().await {
                tracing::warn!(error = %err, "topic index refresh failed after sign-in");
            }
            if let Some(topic) = resume_topic {
                if let Err(err) = self.select_topic(&topic).await {
                    tracing::warn!(topic, error = %err, "failed to load topic after sign-in");
                }
            }
        }
    }

    /// Rebuild the topic index from the store.
    ///
    /// On failure the previous cached entries are retained and the error is
    /// reported; the caller is notified but never blocked on a retry.
    pub async fn refresh_topics(&self) -> Result<(), EngineError> {
        let user = { self.inner.lock().await.identity.clone() };
        let Some(user) = user else {
            return Ok(());
        };

        match self.store.list_chats(&user).await {
            Ok(chats) => {
                let mut inner = self.inner.lock().await;
                if inner.identity.as_ref() != Some(&user) {
                    return Ok(()); // identity changed mid-flight, drop the result
                }
                inner.topics.rebuild(chats);
                inner.emit(EngineEvent::TopicIndexRefreshed {
                    topics: inner.topics.len(),
                });
                Ok(())
            }
            Err(err) => {
                let inner = self.inner.lock().await;
                inner.emit(EngineEvent::TopicIndexRefreshFailed {
                    error: err.to_string(),
                });
                tracing::warn!(error = %err, "topic index refresh failed, keeping cached entries");
                Err(err.into())
            }
        }
    }

    // ========== Topic selection ==========

    /// Switch to a topic: clear the transcript immediately, resolve the
    /// backing chat, and load its history.
    ///
    /// Re-selecting the already loaded topic is a no-op. Without identity
    /// the topic becomes ready with no backing chat and nothing persists.
    /// A load failure degrades to ready-with-empty-transcript: the next
    /// message will create a fresh chat.
    pub async fn select_topic(&self, topic: &str) -> Result<(), EngineError> {
        if topic.is_empty() {
            return Err(EngineError::Validation("topic must not be empty"));
        }

        let (generation, user) = {
            let mut inner = self.inner.lock().await;
            if inner.loaded_topic.as_deref() == Some(topic) {
                return Ok(());
            }
            inner.generation += 1;
            inner.topic = Some(topic.to_string());
            inner.chat_id = None;
            inner.loaded_topic = None;
            inner.transcript.clear(); // never show the previous topic's messages
            inner.state = EngineState::LoadingTopic {
                topic: topic.to_string(),
            };
            (inner.generation, inner.identity.clone())
        };

        let Some(user) = user else {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                return Ok(());
            }
            inner.loaded_topic = Some(topic.to_string());
            inner.state = EngineState::TopicReady {
                topic: topic.to_string(),
                chat_id: None,
            };
            return Ok(());
        };

        let chat_id = match resolver::resolve(self.store.as_ref(), &user, topic).await {
            Ok(found) => found,
            Err(err) => {
                let mut inner = self.inner.lock().await;
                if inner.generation != generation {
                    tracing::debug!(topic, "discarding stale resolution result");
                    return Ok(());
                }
                // Degraded: no history shown, next message starts fresh.
                // loaded_topic stays unset so re-selecting retries the load.
                inner.state = EngineState::TopicReady {
                    topic: topic.to_string(),
                    chat_id: None,
                };
                inner.emit(EngineEvent::LoadFailed {
                    topic: topic.to_string(),
                    error: err.to_string(),
                });
                tracing::warn!(topic, error = %err, "failed to resolve chat for topic");
                return Err(err.into());
            }
        };

        let Some(chat_id) = chat_id else {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                return Ok(());
            }
            inner.loaded_topic = Some(topic.to_string());
            inner.state = EngineState::TopicReady {
                topic: topic.to_string(),
                chat_id: None,
            };
            inner.emit(EngineEvent::TranscriptLoaded {
                topic: topic.to_string(),
                messages: 0,
            });
            return Ok(());
        };

        let loaded = self.store.load_messages(&chat_id).await;

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            tracing::debug!(topic, "discarding stale transcript load");
            return Ok(());
        }
        match loaded {
            Ok(messages) => {
                let count = messages.len();
                inner.transcript.replace(messages);
                inner.chat_id = Some(chat_id.clone());
                inner.loaded_topic = Some(topic.to_string());
                inner.state = EngineState::TopicReady {
                    topic: topic.to_string(),
                    chat_id: Some(chat_id),
                };
                inner.emit(EngineEvent::TranscriptLoaded {
                    topic: topic.to_string(),
                    messages: count,
                });
                Ok(())
            }
            Err(err) => {
                inner.transcript.clear();
                inner.state = EngineState::TopicReady {
                    topic: topic.to_string(),
                    chat_id: None,
                };
                inner.emit(EngineEvent::LoadFailed {
                    topic: topic.to_string(),
                    error: err.to_string(),
                });
                tracing::warn!(topic, error = %err, "failed to load transcript");
                Err(EngineError::Load(err))
            }
        }
    }

    // ========== Sending ==========

    /// Send a question in the active topic.
    ///
    /// The user message is appended optimistically, persisted (creating the
    /// backing chat lazily on the first message), then answered; the
    /// assistant message is appended and persisted on success. Any failure
    /// before the answer arrives rolls back exactly the one optimistic
    /// user message. Without identity nothing persists.
    pub async fn send_message(&self, question: &str) -> Result<Message, EngineError> {
        if question.trim().is_empty() {
            return Err(EngineError::Validation("question must not be empty"));
        }

        let (generation, topic, user, mut chat_id, user_msg) = {
            let mut inner = self.inner.lock().await;
            let Some(topic) = inner.topic.clone().filter(|t| !t.trim().is_empty()) else {
                return Err(EngineError::Validation("topic must not be empty"));
            };
            let user_msg = inner.transcript.append_user(question, &topic);
            inner.emit(EngineEvent::UserMessageAdded(user_msg.clone()));
            (
                inner.generation,
                topic,
                inner.identity.clone(),
                inner.chat_id.clone(),
                user_msg,
            )
        };

        // Persist the user message when signed in; otherwise the transcript
        // stays ephemeral
        if let Some(user) = &user {
            let chat = match chat_id.clone() {
                Some(chat) => chat,
                None => match resolver::ensure(self.store.as_ref(), user, &topic).await {
                    Ok(resolution) => {
                        if resolution.is_new {
                            tracing::debug!(topic, chat_id = %resolution.chat_id, "created chat for first message");
                        }
                        chat_id = Some(resolution.chat_id.clone());
                        resolution.chat_id
                    }
                    Err(err) => return self.fail_send(&user_msg.id, err.into()).await,
                },
            };
            if let Err(err) = self.store.insert_message(&chat, user_msg.clone()).await {
                return self.fail_send(&user_msg.id, err.into()).await;
            }
            let now = now_millis();
            if let Err(err) = self.store.touch_chat(&chat, now).await {
                return self.fail_send(&user_msg.id, err.into()).await;
            }

            let mut inner = self.inner.lock().await;
            inner.topics.touch(&chat, now);
            if inner.generation == generation {
                inner.chat_id = Some(chat.clone());
                if let EngineState::TopicReady { chat_id: bound, .. } = &mut inner.state {
                    *bound = Some(chat.clone());
                }
            }
        }

        let answer = match self.answers.answer(&topic, question).await {
            Ok(answer) => answer,
            Err(err) => {
                return self
                    .fail_send(&user_msg.id, EngineError::Request(err.to_string()))
                    .await;
            }
        };

        let assistant = {
            let mut inner = self.inner.lock().await;
            inner.transcript.confirm(&user_msg.id);
            if inner.generation == generation {
                let msg = inner.transcript.append_assistant(&answer);
                inner.emit(EngineEvent::AssistantMessageAdded(msg.clone()));
                msg
            } else {
                // Topic switched while the answer was in flight; keep the
                // answer out of the new topic's transcript but still
                // persist it to its chat below
                tracing::debug!(topic, "topic changed mid-send, skipping local assistant append");
                Message::assistant(&answer)
            }
        };

        // Assistant persistence failure is not rolled back: the exchange
        // already happened and stays visible, the store just lags behind.
        if user.is_some() {
            if let Some(chat) = chat_id.as_ref() {
                if let Err(err) = self.store.insert_message(chat, assistant.clone()).await {
                    tracing::warn!(chat_id = %chat, error = %err, "failed to persist assistant message");
                } else {
                    let now = now_millis();
                    match self.store.touch_chat(chat, now).await {
                        Ok(()) => self.inner.lock().await.topics.touch(chat, now),
                        Err(err) => {
                            tracing::warn!(chat_id = %chat, error = %err, "failed to touch chat")
                        }
                    }
                }
            }
        }

        Ok(assistant)
    }

    async fn fail_send(
        &self,
        user_msg_id: &MessageId,
        err: EngineError,
    ) -> Result<Message, EngineError> {
        let mut inner = self.inner.lock().await;
        inner.transcript.roll_back(user_msg_id);
        inner.emit(EngineEvent::MessageFailed {
            error: err.to_string(),
        });
        tracing::warn!(error = %err, "send failed, rolled back optimistic message");
        Err(err)
    }

    // ========== Deletion ==========

    /// Delete one topic's backing chat and all its messages
    pub async fn delete_topic(&self, topic: &str) -> Result<(), EngineError> {
        let chat_id = {
            let inner = self.inner.lock().await;
            inner.topics.get(topic).map(|e| e.chat_id.clone())
        };
        let Some(chat_id) = chat_id else {
            return Err(EngineError::Validation("topic has no saved chat"));
        };

        self.store.delete_chat(&chat_id).await?;

        let mut inner = self.inner.lock().await;
        Self::apply_deletion(&mut inner, topic, &chat_id);
        inner.emit(EngineEvent::TopicsDeleted {
            deleted: 1,
            failed: 0,
        });
        Ok(())
    }

    /// Delete several topics, reporting which succeeded and which failed.
    ///
    /// Failed entries remain in the index; succeeded ones are evicted. If
    /// the active topic is among the deleted, its transcript empties and
    /// it keeps no backing chat (the next message starts a fresh one).
    pub async fn delete_topics(&self, topics: &[String]) -> DeletionReport {
        let targets: Vec<(String, Option<ChatId>)> = {
            let inner = self.inner.lock().await;
            topics
                .iter()
                .map(|t| (t.clone(), inner.topics.get(t).map(|e| e.chat_id.clone())))
                .collect()
        };

        let deletions = targets.iter().map(|(_, chat_id)| {
            let store = Arc::clone(&self.store);
            let chat_id = chat_id.clone();
            async move {
                match chat_id {
                    Some(id) => store.delete_chat(&id).await.map(|_| id),
                    None => Err(StoreError::Unavailable(
                        "topic has no saved chat".to_string(),
                    )),
                }
            }
        });
        let results = futures::future::join_all(deletions).await;

        let mut report = DeletionReport::default();
        let mut inner = self.inner.lock().await;
        for ((topic, _), result) in targets.into_iter().zip(results) {
            match result {
                Ok(chat_id) => {
                    Self::apply_deletion(&mut inner, &topic, &chat_id);
                    report.deleted.push(topic);
                }
                Err(err) => {
                    tracing::warn!(topic, error = %err, "failed to delete topic");
                    report.failed.push(topic);
                }
            }
        }
        inner.emit(EngineEvent::TopicsDeleted {
            deleted: report.deleted.len(),
            failed: report.failed.len(),
        });
        report
    }

    /// Evict the index entry and, if the deleted topic is the active one,
    /// empty the transcript and drop the chat binding.
    fn apply_deletion(inner: &mut EngineInner, topic: &str, chat_id: &ChatId) {
        inner.topics.remove(chat_id);
        if inner.topic.as_deref() == Some(topic) {
            inner.transcript.clear();
            inner.chat_id = None;
            inner.loaded_topic = Some(topic.to_string()); // nothing left to load
            if matches!(
                inner.state,
                EngineState::TopicReady { .. } | EngineState::LoadingTopic { .. }
            ) {
                inner.state = EngineState::TopicReady {
                    topic: topic.to_string(),
                    chat_id: None,
                };
            }
        }
    }

    // ========== Snapshots ==========

    pub async fn state(&self) -> EngineState {
        self.inner.lock().await.state.clone()
    }

    /// Snapshot of the active transcript, oldest first
    pub async fn transcript(&self) -> Vec<Message> {
        self.inner.lock().await.transcript.messages().to_vec()
    }

    /// Snapshot of the topic index, most recently updated first
    pub async fn topics(&self) -> Vec<TopicEntry> {
        self.inner.lock().await.topics.entries().to_vec()
    }
}
