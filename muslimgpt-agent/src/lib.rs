//! Conversation handling for MuslimGPT
//!
//! The [`ConversationController`] turns user prompts into completion calls
//! and persisted message pairs.

pub mod context;
pub mod controller;

pub use context::ContextBuilder;
pub use controller::{CompletionFailure, ConversationController, SendOutcome};
