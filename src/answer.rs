//! Answer service seam
//!
//! The actual question answering (prompt templating, LLM invocation) is an
//! external collaborator consumed as a black box. The engine only needs
//! this one request/response call.

use async_trait::async_trait;

/// Answers a question about an academic topic
#[async_trait]
pub trait AnswerService: Send + Sync {
    /// Produce an answer for `question` in the context of `topic`.
    ///
    /// Any failure is opaque to the engine and reported as a request error;
    /// the engine rolls back the optimistic user message and never appends
    /// an assistant message for a failed request.
    async fn answer(&self, topic: &str, question: &str) -> anyhow::Result<String>;
}
