//! Error taxonomy for the sync engine
//!
//! Validation failures are rejected before any network call; store and
//! answer-service failures are caught at the operation boundary and roll
//! back optimistic state. Nothing here is fatal to the process and no
//! operation retries automatically.

use thiserror::Error;

use crate::store::StoreError;

/// A failure scoped to one engine operation
#[derive(Debug, Error)]
pub enum EngineError {
    /// The store could not be reached while reading or writing
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Fetching the transcript for a resolved chat failed
    #[error("failed to load transcript: {0}")]
    Load(StoreError),

    /// The answer service rejected or failed the request
    #[error("answer request failed: {0}")]
    Request(String),

    /// Rejected locally before any network call
    #[error("validation failed: {0}")]
    Validation(&'static str),
}

impl EngineError {
    /// True for errors that never reached the store or answer service
    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::Validation(_))
    }
}
