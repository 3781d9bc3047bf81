//! Session management for conversation history
//!
//! A session lives in two places: the [`SessionContext`] the caller holds for
//! the conversation in progress, and the records in the message store. The
//! [`SessionRegistry`] is derived from the store on demand.

pub mod context;
pub mod registry;

pub use context::{new_session_id, SessionContext, SessionState, Turn};
pub use registry::{SessionEntry, SessionRegistry};
