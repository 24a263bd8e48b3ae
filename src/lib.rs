//! Chat-session/topic synchronization engine for the AiStudy tutoring flow
//!
//! This crate reconciles a locally held conversation transcript with a
//! remote per-user chat store keyed by free-text topic. It provides:
//! - **Traits**: `ChatStore` (remote store seam), `AnswerService` (LLM seam)
//! - **State**: `Transcript` (optimistic message list), `TopicIndex` (cached
//!   topic summaries)
//! - **Engine**: `TutorEngine`, the lifecycle controller driving identity
//!   changes, topic switches, sends with rollback, and topic deletion
//! - **Storage**: `MemoryChatStore`, an in-memory backend for tests and
//!   unsaved runs
//!
//! Topics act as partition keys: at most one chat per (user, topic) is ever
//! treated as current, with latest-updated winning when races created
//! duplicates. The engine applies user messages optimistically and rolls
//! back exactly that message when persistence or answering fails.

pub mod answer;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod store;
pub mod topics;
pub mod transcript;
pub mod types;

pub use answer::AnswerService;
pub use engine::{DeletionReport, EngineEvent, EngineState, TutorEngine};
pub use error::EngineError;
pub use resolver::Resolution;
pub use store::{ChatStore, MemoryChatStore, StoreError};
pub use topics::TopicIndex;
pub use transcript::Transcript;
pub use types::{ChatId, ChatRecord, Message, MessageId, Role, TopicEntry, UserId};
