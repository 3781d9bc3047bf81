//! Message store for conversation history
//!
//! The store is a flat, insert-only log of [`ChatRecord`]s. Every backend
//! returns records in insertion order; the session registry relies on it.

pub mod jsonl;
pub mod memory;
pub mod record;

pub use jsonl::JsonlMessageStore;
pub use memory::MemoryMessageStore;
pub use record::{ChatRecord, Role};

/// Append-only collection of message records keyed by session id
pub trait MessageStore: Send + Sync {
    /// Append one record
    fn insert(&self, record: &ChatRecord) -> crate::Result<()>;

    /// Every record across all sessions, in insertion order
    fn all(&self) -> crate::Result<Vec<ChatRecord>>;

    /// Delete every record of a session, returning how many were removed.
    ///
    /// An unknown session id removes nothing and is not an error.
    fn remove(&self, session_id: &str) -> crate::Result<usize>;

    /// Records of one session, in insertion order
    fn session_records(&self, session_id: &str) -> crate::Result<Vec<ChatRecord>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|record| record.session_id == session_id)
            .collect())
    }
}
