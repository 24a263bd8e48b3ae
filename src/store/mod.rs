//! Store adapter boundary for chat persistence
//!
//! This module defines the `ChatStore` trait — the seam to the remote
//! document store — and an in-memory implementation used by the engine
//! tests. The real backing store is an external collaborator; everything
//! in this crate talks to it through the trait.

mod memory;
mod traits;

pub use memory::MemoryChatStore;
pub use traits::{ChatStore, StoreError, StoreResult};
