//! Conversation controller: prompt in, reply out, pair persisted

use muslimgpt_core::session::{SessionContext, SessionRegistry, SessionState, Turn};
use muslimgpt_core::store::{ChatRecord, MessageStore, Role};
use muslimgpt_providers::{CompletionClient, ProviderError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::context::ContextBuilder;

/// Any failure of the completion call, whatever the cause
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CompletionFailure(#[from] pub ProviderError);

/// Result of [`ConversationController::send`]
#[derive(Debug)]
pub enum SendOutcome {
    /// Empty prompt; nothing happened
    Ignored,
    /// The assistant reply, already persisted with its prompt
    Replied(String),
    /// The completion call failed. The prompt stays in memory, unsaved.
    Failed(CompletionFailure),
}

/// Mediates between user input, the completion client and the message store.
///
/// Holds no conversation state of its own; every operation works on the
/// [`SessionContext`] it is given.
pub struct ConversationController {
    store: Arc<dyn MessageStore>,
    client: Arc<dyn CompletionClient>,
    context: ContextBuilder,
}

impl ConversationController {
    /// Create a new controller
    pub fn new(
        store: Arc<dyn MessageStore>,
        client: Arc<dyn CompletionClient>,
        system_instruction: impl Into<String>,
    ) -> Self {
        Self {
            store,
            client,
            context: ContextBuilder::new(system_instruction),
        }
    }

    pub fn store(&self) -> &dyn MessageStore {
        self.store.as_ref()
    }

    pub fn model(&self) -> String {
        self.client.model()
    }

    /// Current session list, derived from the store
    pub fn registry(&self) -> muslimgpt_core::Result<SessionRegistry> {
        SessionRegistry::load(self.store.as_ref())
    }

    /// Start a fresh, unsaved session
    pub fn new_session(&self, ctx: &mut SessionContext) {
        ctx.reset();
        debug!("Started new session {}", ctx.session_id());
    }

    /// Make `session_id` the active session, with its stored history.
    ///
    /// An id with no records yields an empty conversation, not an error.
    pub fn load_session(
        &self,
        ctx: &mut SessionContext,
        session_id: &str,
    ) -> muslimgpt_core::Result<SessionState> {
        let records = self.store.session_records(session_id)?;
        let title = records.first().map(|record| record.title.clone());
        let messages: Vec<Turn> = records.into_iter().map(Turn::from).collect();

        debug!(
            "Loaded session {} with {} messages",
            session_id,
            messages.len()
        );
        ctx.replace(session_id, messages, title);
        Ok(ctx.state())
    }

    /// Send a prompt in the active session.
    ///
    /// On success both turns are written to the store, user first, under the
    /// session's stored title, or under `prompt` when nothing has been saved
    /// for the session yet. On completion failure nothing is written and the
    /// prompt remains the last in-memory turn. Store errors are returned as
    /// `Err`.
    pub async fn send(
        &self,
        ctx: &mut SessionContext,
        prompt: &str,
    ) -> muslimgpt_core::Result<SendOutcome> {
        if prompt.trim().is_empty() {
            return Ok(SendOutcome::Ignored);
        }

        ctx.push(Turn::user(prompt));

        let history = self.context.build_history(ctx.messages());
        info!(
            session_id = %ctx.session_id(),
            turns = history.len(),
            "Requesting completion"
        );

        let reply = match self
            .client
            .complete(history, self.context.system_instruction())
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(session_id = %ctx.session_id(), "Completion failed: {}", e);
                return Ok(SendOutcome::Failed(CompletionFailure(e)));
            }
        };

        ctx.push(Turn::assistant(reply.clone()));

        let chat_title = ctx.title().unwrap_or(prompt).to_string();

        let session_id = ctx.session_id().to_string();
        self.store.insert(&ChatRecord::new(
            session_id.as_str(),
            chat_title.as_str(),
            Role::User,
            prompt,
        ))?;
        ctx.set_title(chat_title.as_str());

        self.store.insert(&ChatRecord::new(
            session_id.as_str(),
            chat_title.as_str(),
            Role::Assistant,
            reply.as_str(),
        ))?;

        info!(session_id = %session_id, "Persisted message pair");
        Ok(SendOutcome::Replied(reply))
    }

    /// Delete every stored record of a session.
    ///
    /// Does not touch any in-memory context; callers deleting the active
    /// session should call [`Self::new_session`] themselves.
    pub fn delete_session(&self, session_id: &str) -> muslimgpt_core::Result<usize> {
        let removed = self.store.remove(session_id)?;
        info!("Deleted session {} ({} records)", session_id, removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use muslimgpt_core::store::{JsonlMessageStore, MemoryMessageStore};
    use muslimgpt_providers::{ApiRole, ConversationTurn, ProviderResult};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    const INSTRUCTION: &str = "You are MuslimGPT. Answer concisely. Use Sahih sources.";

    /// Replays canned results and records every request
    struct ScriptedClient {
        replies: Mutex<VecDeque<ProviderResult<String>>>,
        requests: Mutex<Vec<(Vec<ConversationTurn>, String)>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<ProviderResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<(Vec<ConversationTurn>, String)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(
            &self,
            history: Vec<ConversationTurn>,
            system_instruction: &str,
        ) -> ProviderResult<String> {
            self.requests
                .lock()
                .unwrap()
                .push((history, system_instruction.to_string()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::ApiError("script exhausted".to_string())))
        }

        fn model(&self) -> String {
            "scripted".to_string()
        }
    }

    /// Memory store whose next assistant insert can be made to fail
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryMessageStore,
        fail_next_assistant: AtomicBool,
    }

    impl MessageStore for FlakyStore {
        fn insert(&self, record: &ChatRecord) -> muslimgpt_core::Result<()> {
            if record.role == Role::Assistant
                && self.fail_next_assistant.swap(false, Ordering::SeqCst)
            {
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.insert(record)
        }

        fn all(&self) -> muslimgpt_core::Result<Vec<ChatRecord>> {
            self.inner.all()
        }

        fn remove(&self, session_id: &str) -> muslimgpt_core::Result<usize> {
            self.inner.remove(session_id)
        }
    }

    fn ok(text: &str) -> ProviderResult<String> {
        Ok(text.to_string())
    }

    fn api_error() -> ProviderResult<String> {
        Err(ProviderError::ApiError("HTTP 429: quota exceeded".to_string()))
    }

    fn controller(
        store: Arc<MemoryMessageStore>,
        client: Arc<ScriptedClient>,
    ) -> ConversationController {
        ConversationController::new(store, client, INSTRUCTION)
    }

    #[tokio::test]
    async fn test_empty_prompt_is_noop() {
        let store = Arc::new(MemoryMessageStore::new());
        let client = ScriptedClient::new(vec![ok("unused")]);
        let controller = controller(store.clone(), client.clone());
        let mut ctx = SessionContext::new();
        let id = ctx.session_id().to_string();

        let outcome = controller.send(&mut ctx, "").await.unwrap();
        assert!(matches!(outcome, SendOutcome::Ignored));
        let outcome = controller.send(&mut ctx, "  \n").await.unwrap();
        assert!(matches!(outcome, SendOutcome::Ignored));

        assert!(store.is_empty());
        assert!(ctx.is_empty());
        assert_eq!(ctx.session_id(), id);
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_first_send_persists_titled_pair() {
        let store = Arc::new(MemoryMessageStore::new());
        let client = ScriptedClient::new(vec![ok("Zakat is obligatory charity.")]);
        let controller = controller(store.clone(), client.clone());
        let mut ctx = SessionContext::new();

        let outcome = controller.send(&mut ctx, "What is Zakat?").await.unwrap();
        let SendOutcome::Replied(reply) = outcome else {
            panic!("expected a reply, got {:?}", outcome);
        };
        assert_eq!(reply, "Zakat is obligatory charity.");

        let records = store.all().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.session_id == ctx.session_id()));
        assert!(records.iter().all(|r| r.title == "What is Zakat?"));
        assert_eq!(records[0].role, Role::User);
        assert_eq!(records[0].content, "What is Zakat?");
        assert_eq!(records[1].role, Role::Assistant);
        assert_eq!(records[1].content, "Zakat is obligatory charity.");

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, vec![ConversationTurn::user("What is Zakat?")]);
        assert_eq!(requests[0].1, INSTRUCTION);
        assert_eq!(ctx.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_follow_up_keeps_title_and_sends_full_history() {
        let store = Arc::new(MemoryMessageStore::new());
        let client = ScriptedClient::new(vec![ok("Obligatory charity."), ok("2.5%.")]);
        let controller = controller(store.clone(), client.clone());
        let mut ctx = SessionContext::new();

        controller.send(&mut ctx, "What is Zakat?").await.unwrap();
        controller.send(&mut ctx, "How much?").await.unwrap();

        let records = store.all().unwrap();
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.title == "What is Zakat?"));

        let history = &client.requests()[1].0;
        let roles: Vec<ApiRole> = history.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![ApiRole::User, ApiRole::Model, ApiRole::User]);
        assert_eq!(history[2].text, "How much?");

        let registry = controller.registry().unwrap();
        assert_eq!(registry.title(ctx.session_id()), Some("What is Zakat?"));
    }

    #[tokio::test]
    async fn test_failure_keeps_prompt_in_memory_only() {
        let store = Arc::new(MemoryMessageStore::new());
        let client = ScriptedClient::new(vec![api_error()]);
        let controller = controller(store.clone(), client);
        let mut ctx = SessionContext::new();

        let outcome = controller.send(&mut ctx, "What is Zakat?").await.unwrap();

        let SendOutcome::Failed(failure) = outcome else {
            panic!("expected a failure, got {:?}", outcome);
        };
        assert!(failure.to_string().contains("quota exceeded"));
        assert!(store.is_empty());
        assert_eq!(ctx.messages(), &[Turn::user("What is Zakat?")]);
        assert!(controller.registry().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_after_failure_titles_with_first_saved_prompt() {
        let store = Arc::new(MemoryMessageStore::new());
        let client = ScriptedClient::new(vec![api_error(), ok("Five.")]);
        let controller = controller(store.clone(), client.clone());
        let mut ctx = SessionContext::new();

        controller.send(&mut ctx, "What is Zakat?").await.unwrap();
        let outcome = controller
            .send(&mut ctx, "How many daily prayers?")
            .await
            .unwrap();
        assert!(matches!(outcome, SendOutcome::Replied(_)));

        let records = store.all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].content, "How many daily prayers?");
        assert!(records.iter().all(|r| r.title == "How many daily prayers?"));
        assert_eq!(client.requests()[1].0.len(), 2);
        assert_eq!(ctx.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_half_written_pair_keeps_session_title() {
        let store = Arc::new(FlakyStore::default());
        store.fail_next_assistant.store(true, Ordering::SeqCst);
        let client = ScriptedClient::new(vec![ok("Obligatory charity."), ok("2.5%.")]);
        let controller = ConversationController::new(store.clone(), client, INSTRUCTION);
        let mut ctx = SessionContext::new();

        assert!(controller.send(&mut ctx, "What is Zakat?").await.is_err());
        assert_eq!(ctx.title(), Some("What is Zakat?"));

        controller.send(&mut ctx, "How much?").await.unwrap();

        let records = store.all().unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.title == "What is Zakat?"));
    }

    #[tokio::test]
    async fn test_load_unknown_session_is_empty() {
        let store = Arc::new(MemoryMessageStore::new());
        let controller = controller(store, ScriptedClient::new(vec![]));
        let mut ctx = SessionContext::new();
        ctx.push(Turn::user("stale"));

        let state = controller.load_session(&mut ctx, "no-such-session").unwrap();

        assert_eq!(state, SessionState::Empty);
        assert!(ctx.is_empty());
        assert_eq!(ctx.session_id(), "no-such-session");
    }

    #[tokio::test]
    async fn test_new_session_then_load_restores_exchange() {
        let store = Arc::new(MemoryMessageStore::new());
        let client = ScriptedClient::new(vec![ok("Obligatory charity.")]);
        let controller = controller(store, client);
        let mut ctx = SessionContext::new();

        controller.send(&mut ctx, "What is Zakat?").await.unwrap();
        let original_id = ctx.session_id().to_string();
        let original_messages = ctx.messages().to_vec();

        controller.new_session(&mut ctx);
        assert!(ctx.is_empty());
        assert_ne!(ctx.session_id(), original_id);

        let state = controller.load_session(&mut ctx, &original_id).unwrap();
        assert_eq!(state, SessionState::Active);
        assert_eq!(ctx.session_id(), original_id);
        assert_eq!(ctx.messages(), original_messages.as_slice());
    }

    #[tokio::test]
    async fn test_new_session_is_not_listed_until_first_pair() {
        let store = Arc::new(MemoryMessageStore::new());
        let client = ScriptedClient::new(vec![ok("Wa alaykum salaam.")]);
        let controller = controller(store, client);
        let mut ctx = SessionContext::new();

        controller.new_session(&mut ctx);
        assert!(!controller.registry().unwrap().contains(ctx.session_id()));

        controller.send(&mut ctx, "Salaam").await.unwrap();
        assert!(controller.registry().unwrap().contains(ctx.session_id()));
    }

    #[tokio::test]
    async fn test_delete_active_session_leaves_context_alone() {
        let store = Arc::new(MemoryMessageStore::new());
        let client = ScriptedClient::new(vec![ok("one"), ok("two")]);
        let controller = controller(store.clone(), client);

        let mut first = SessionContext::new();
        controller.send(&mut first, "First question").await.unwrap();
        let mut second = SessionContext::new();
        controller.send(&mut second, "Second question").await.unwrap();

        let removed = controller.delete_session(first.session_id()).unwrap();

        assert_eq!(removed, 2);
        assert_eq!(first.messages().len(), 2);
        let registry = controller.registry().unwrap();
        assert!(!registry.contains(first.session_id()));
        assert!(registry.contains(second.session_id()));
        assert_eq!(controller.delete_session("unknown").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("chat_db.jsonl");
        let client = ScriptedClient::new(vec![ok("Obligatory charity.")]);
        let controller = ConversationController::new(
            Arc::new(JsonlMessageStore::open(&path).unwrap()),
            client,
            INSTRUCTION,
        );
        let mut ctx = SessionContext::new();
        controller.send(&mut ctx, "What is Zakat?").await.unwrap();

        let reopened = ConversationController::new(
            Arc::new(JsonlMessageStore::open(&path).unwrap()),
            ScriptedClient::new(vec![]),
            INSTRUCTION,
        );
        let mut fresh = SessionContext::new();
        reopened.load_session(&mut fresh, ctx.session_id()).unwrap();

        assert_eq!(fresh.messages(), ctx.messages());
        assert_eq!(reopened.registry().unwrap().len(), 1);
    }
}
