//! Context builder for completion requests

use muslimgpt_core::session::Turn;
use muslimgpt_providers::ConversationTurn;

/// Builds what is sent to the completion client for each prompt
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_instruction: String,
}

impl ContextBuilder {
    /// Create a new context builder
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
        }
    }

    /// Instruction attached to every request
    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    /// The full conversation in API role vocabulary, oldest first
    pub fn build_history(&self, messages: &[Turn]) -> Vec<ConversationTurn> {
        messages.iter().map(ConversationTurn::from).collect()
    }
}
