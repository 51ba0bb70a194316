use crate::backend::NarrativeBackend;
use crate::credits::CreditGuard;
use crate::error::{EngineError, EngineResult};
use crate::history;
use crate::reveal::{self, REVEAL_TICK, Reveal};
use crate::session::{Command, SessionHandle};
use crate::types::{ChatMessage, MessageMetadata, NarrativeLength, NarrativeParameters, Role};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Drives generation and continuation requests against the backend.
///
/// The user's turn is always inserted synchronously before the network call
/// suspends, so a reply can never be observed without its preceding user
/// message. `is_generating` is an advisory lock: callers are expected to
/// suppress new submissions while it is set; the coordinator itself never
/// has two of its own calls in flight because each submit awaits to
/// completion.
pub struct RequestCoordinator {
    backend: Arc<dyn NarrativeBackend>,
    session: SessionHandle,
    credits: Arc<CreditGuard>,
    reveal_tick: Duration,
    live_reveal: Mutex<Option<Reveal>>,
}

impl RequestCoordinator {
    pub fn new(
        backend: Arc<dyn NarrativeBackend>,
        session: SessionHandle,
        credits: Arc<CreditGuard>,
    ) -> Self {
        Self {
            backend,
            session,
            credits,
            reveal_tick: REVEAL_TICK,
            live_reveal: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn credits(&self) -> &CreditGuard {
        &self.credits
    }

    /// Start a new narrative. The quota gate runs first: with no credits
    /// left the call fails without touching the network or the thread.
    pub async fn submit_new(
        &self,
        parameters: NarrativeParameters,
        length: NarrativeLength,
    ) -> EngineResult<()> {
        if !self.credits.can_submit() {
            return Err(EngineError::QuotaExceeded);
        }

        let metadata = MessageMetadata {
            narrative_length: length,
            parameters: parameters.clone(),
        };
        let summary = format!(
            "Generate a {} brand narrative for my {} business",
            length.as_str(),
            parameters.industry
        );
        self.session.apply(Command::PushUser(ChatMessage::new(
            Role::User,
            summary,
            Some(metadata.clone()),
        )));
        self.session.apply(Command::BeginRequest);

        match self.backend.generate(&parameters, length).await {
            Ok(outcome) => {
                tracing::debug!(chat_id = %outcome.chat_id, "narrative generated");
                let title = history::derive_title(&outcome.response_text);
                let reply = ChatMessage::new(
                    Role::Assistant,
                    outcome.response_text.clone(),
                    Some(metadata),
                );
                self.session.apply(Command::CompleteGeneration {
                    chat_id: outcome.chat_id,
                    message: reply,
                    title,
                });
                self.credits.note_consumed();
                self.begin_reveal(&outcome.response_text);
                Ok(())
            }
            Err(err) => Err(self.fail_request(err.to_string())),
        }
    }

    /// Append a follow-up instruction to an existing conversation. The
    /// prompt is used verbatim as the user's message content.
    pub async fn submit_continuation(&self, chat_id: &str, prompt: &str) -> EngineResult<()> {
        if !self.credits.can_submit() {
            return Err(EngineError::QuotaExceeded);
        }

        self.session
            .apply(Command::PushUser(ChatMessage::user(prompt)));
        self.session.apply(Command::BeginRequest);

        match self.backend.continue_chat(chat_id, prompt).await {
            Ok(outcome) => {
                tracing::debug!(chat_id = %outcome.chat_id, "narrative continued");
                let reply = ChatMessage::assistant(outcome.response_text.clone());
                self.session.apply(Command::CompleteContinuation {
                    chat_id: outcome.chat_id,
                    message: reply,
                });
                self.credits.note_consumed();
                self.begin_reveal(&outcome.response_text);
                Ok(())
            }
            Err(err) => Err(self.fail_request(err.to_string())),
        }
    }

    /// Re-fetch the full conversation list, replacing local history
    /// (including any provisional client-synthesized entries).
    pub async fn refresh_history(&self) -> EngineResult<()> {
        self.session.apply(Command::HistoryLoading);
        match self.backend.fetch_history().await {
            Ok(records) => {
                self.session
                    .apply(Command::ReplaceHistory(history::normalize(records)));
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                self.session.apply(Command::HistoryFailed(message.clone()));
                Err(EngineError::RequestFailed(message))
            }
        }
    }

    /// Replace the local credit cache with the server's balance. A failed
    /// refresh is logged and leaves the cache untouched.
    pub async fn refresh_credits(&self) -> EngineResult<()> {
        match self.backend.fetch_credits().await {
            Ok(snapshot) => {
                self.credits.replace(&snapshot);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "credit refresh failed");
                Err(EngineError::RequestFailed(err.to_string()))
            }
        }
    }

    /// Clear the working thread for a fresh conversation, cancelling any
    /// reveal still animating the previous one.
    pub fn new_conversation(&self) {
        self.dispose_reveal();
        self.session.apply(Command::ClearThread);
    }

    /// Load a past conversation into the working thread, cancelling any
    /// reveal belonging to the thread being switched away from.
    pub fn open_thread(&self, chat_id: &str) {
        self.dispose_reveal();
        self.session.apply(Command::OpenThread {
            chat_id: chat_id.to_string(),
        });
    }

    /// The animated projection of the latest reply: the revealed prefix and
    /// whether the animation has completed. `None` when nothing is revealing.
    pub fn reveal_snapshot(&self) -> Option<(String, bool)> {
        let slot = self.live_reveal.lock().expect("reveal slot poisoned");
        slot.as_ref().map(|reveal| reveal.snapshot())
    }

    fn begin_reveal(&self, content: &str) {
        let reveal = reveal::start_reveal(content, self.reveal_tick, self.session.clone());
        let mut slot = self.live_reveal.lock().expect("reveal slot poisoned");
        if let Some(previous) = slot.replace(reveal) {
            previous.dispose();
        }
    }

    fn dispose_reveal(&self) {
        let mut slot = self.live_reveal.lock().expect("reveal slot poisoned");
        if let Some(reveal) = slot.take() {
            reveal.dispose();
        }
    }

    fn fail_request(&self, message: String) -> EngineError {
        tracing::warn!(error = %message, "narrative request failed");
        self.session.apply(Command::FailRequest(message.clone()));
        EngineError::RequestFailed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        BackendError, BackendResult, CreditSnapshot, GenerationOutcome, RawConversation,
    };
    use crate::credits::CreditState;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct ScriptedBackend {
        outcomes: Mutex<VecDeque<BackendResult<GenerationOutcome>>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn with_outcomes(outcomes: Vec<BackendResult<GenerationOutcome>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn next_outcome(&self) -> BackendResult<GenerationOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::new("no scripted outcome")))
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NarrativeBackend for ScriptedBackend {
        async fn generate(
            &self,
            _parameters: &NarrativeParameters,
            _length: NarrativeLength,
        ) -> BackendResult<GenerationOutcome> {
            self.next_outcome()
        }

        async fn continue_chat(
            &self,
            _chat_id: &str,
            _prompt: &str,
        ) -> BackendResult<GenerationOutcome> {
            self.next_outcome()
        }

        async fn fetch_history(&self) -> BackendResult<Vec<RawConversation>> {
            Ok(Vec::new())
        }

        async fn fetch_credits(&self) -> BackendResult<CreditSnapshot> {
            Ok(CreditSnapshot::default())
        }
    }

    fn coordinator_with(
        backend: Arc<ScriptedBackend>,
        remaining: i64,
    ) -> RequestCoordinator {
        RequestCoordinator::new(
            backend,
            SessionHandle::new(),
            Arc::new(CreditGuard::new(CreditState {
                remaining,
                last_reset: String::new(),
            })),
        )
    }

    fn params() -> NarrativeParameters {
        NarrativeParameters {
            industry: "coffee".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn exhausted_quota_blocks_without_a_network_call() {
        let backend = ScriptedBackend::default();
        let backend = Arc::new(backend);
        let coordinator = coordinator_with(Arc::clone(&backend), 0);

        let result = coordinator
            .submit_new(params(), NarrativeLength::Short)
            .await;
        assert!(matches!(result, Err(EngineError::QuotaExceeded)));
        assert_eq!(backend.call_count(), 0);

        let state = coordinator.session().snapshot();
        assert!(state.current_thread.is_empty());
        assert!(!state.is_generating);
    }

    #[tokio::test]
    async fn failed_generation_keeps_credits_and_drops_flags() {
        let backend =
            ScriptedBackend::with_outcomes(vec![Err(BackendError::new("Network error"))]);
        let coordinator = coordinator_with(Arc::clone(&backend), 2);

        let result = coordinator
            .submit_new(params(), NarrativeLength::Short)
            .await;
        assert!(matches!(result, Err(EngineError::RequestFailed(_))));
        assert_eq!(coordinator.credits().remaining(), 2);

        let state = coordinator.session().snapshot();
        assert!(!state.is_generating);
        assert!(!state.is_streaming);
        assert_eq!(state.error.as_deref(), Some("Network error"));
        // the optimistic user turn is retained
        assert_eq!(state.current_thread.len(), 1);
    }

    #[tokio::test]
    async fn successful_generation_grows_thread_by_two_and_spends_one_credit() {
        let backend = ScriptedBackend::with_outcomes(vec![Ok(GenerationOutcome {
            chat_id: "chat-9".into(),
            response_text: "**Title of Narrative:** Brew\n**Narrative:** body".into(),
        })]);
        let coordinator = coordinator_with(Arc::clone(&backend), 2);

        coordinator
            .submit_new(params(), NarrativeLength::Long)
            .await
            .unwrap();

        assert_eq!(coordinator.credits().remaining(), 1);
        let state = coordinator.session().snapshot();
        assert_eq!(state.current_thread.len(), 2);
        assert_eq!(
            state.current_thread[0].content,
            "Generate a long brand narrative for my coffee business"
        );
        assert_eq!(state.current_chat_id.as_deref(), Some("chat-9"));
        assert_eq!(state.chat_history[0].title, "Brew");
        assert!(state.is_streaming);
        assert!(!state.is_generating);
        assert!(coordinator.reveal_snapshot().is_some());
    }

    #[tokio::test]
    async fn switching_thread_disposes_the_live_reveal() {
        let backend = ScriptedBackend::with_outcomes(vec![Ok(GenerationOutcome {
            chat_id: "chat-1".into(),
            response_text: "a long reply that keeps revealing".into(),
        })]);
        let coordinator = coordinator_with(Arc::clone(&backend), 1);

        coordinator
            .submit_new(params(), NarrativeLength::Short)
            .await
            .unwrap();
        assert!(coordinator.reveal_snapshot().is_some());

        coordinator.new_conversation();
        assert!(coordinator.reveal_snapshot().is_none());
        assert!(!coordinator.session().is_streaming());
    }
}
