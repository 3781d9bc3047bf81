//! Active conversation state

use crate::store::{ChatRecord, Role};
use uuid::Uuid;

/// Mint a fresh random session id
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// A role-tagged message held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<ChatRecord> for Turn {
    fn from(record: ChatRecord) -> Self {
        Self {
            role: record.role,
            content: record.content,
        }
    }
}

/// Whether the conversation has any messages yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Fresh id, nothing in memory or on disk
    Empty,
    /// At least one message
    Active,
}

/// The conversation currently shown to the user.
///
/// Owned by the caller and handed to every controller operation.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: String,
    messages: Vec<Turn>,
    title: Option<String>,
}

impl SessionContext {
    /// Create an empty context with a fresh session id
    pub fn new() -> Self {
        Self::with_id(new_session_id())
    }

    /// Create an empty context bound to an existing session id
    pub fn with_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            title: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn messages(&self) -> &[Turn] {
        &self.messages
    }

    pub fn state(&self) -> SessionState {
        if self.messages.is_empty() {
            SessionState::Empty
        } else {
            SessionState::Active
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Title the session is stored under; `None` until its first pair is saved
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    pub fn push(&mut self, turn: Turn) {
        self.messages.push(turn);
    }

    /// Switch to a brand-new session, dropping in-memory messages
    pub fn reset(&mut self) {
        self.session_id = new_session_id();
        self.messages.clear();
        self.title = None;
    }

    /// Switch to `session_id` with the given history and stored title
    pub fn replace(
        &mut self,
        session_id: impl Into<String>,
        messages: Vec<Turn>,
        title: Option<String>,
    ) {
        self.session_id = session_id.into();
        self.messages = messages;
        self.title = title;
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
