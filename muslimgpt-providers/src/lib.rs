//! Completion API integration for MuslimGPT
//!
//! This crate defines the [`CompletionClient`] boundary and the Gemini
//! `generateContent` implementation behind it.

pub mod base;
pub mod gemini;

pub use base::{
    ApiRole, CompletionClient, ConversationTurn, ProviderError, ProviderResult,
};
pub use gemini::GeminiClient;
