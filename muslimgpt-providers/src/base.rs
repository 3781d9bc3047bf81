//! Base trait for completion clients

use async_trait::async_trait;
use muslimgpt_core::session::Turn;
use muslimgpt_core::store::Role;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for provider operations
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Role vocabulary of the completion API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiRole {
    User,
    Model,
}

impl From<Role> for ApiRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ApiRole::User,
            Role::Assistant => ApiRole::Model,
        }
    }
}

/// One turn as sent to the completion API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: ApiRole,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ApiRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ApiRole::Model,
            text: text.into(),
        }
    }
}

impl From<&Turn> for ConversationTurn {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.into(),
            text: turn.content.clone(),
        }
    }
}

/// A remote text-generation call.
///
/// Takes the whole ordered conversation and returns one reply, buffered in
/// full. Implementations do not retry.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate the next model turn for `history`
    async fn complete(
        &self,
        history: Vec<ConversationTurn>,
        system_instruction: &str,
    ) -> ProviderResult<String>;

    /// Model id requests are sent to
    fn model(&self) -> String;
}
