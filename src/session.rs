use crate::history;
use crate::types::{ChatMessage, ChatThread};
use std::sync::{Arc, Mutex};

// ============================================
// Session State
// ============================================

/// The aggregate session state: the active thread being composed, the list of
/// past conversations, and the request/reveal flags the presentation layer
/// renders from.
///
/// `current_thread` is always a working copy; it never aliases a history
/// entry. `current_chat_id` is a lookup-only back-reference to the matching
/// history entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    pub chat_history: Vec<ChatThread>,
    pub current_thread: Vec<ChatMessage>,
    pub current_chat_id: Option<String>,
    pub is_generating: bool,
    pub is_streaming: bool,
    pub history_loading: bool,
    pub error: Option<String>,
}

// ============================================
// Commands
// ============================================

/// Every mutation of [`SessionState`] is one of these variants, applied as a
/// single atomic transition step. Nothing outside [`SessionHandle::apply`]
/// writes session state.
#[derive(Clone, Debug)]
pub enum Command {
    /// Optimistic insertion of the user's turn, before the network call.
    PushUser(ChatMessage),
    /// A request left for the backend: raise both flags, clear stale errors.
    BeginRequest,
    /// A fresh generation succeeded: append the reply, adopt the server's
    /// conversation id, and prepend a provisional history entry.
    CompleteGeneration {
        chat_id: String,
        message: ChatMessage,
        title: String,
    },
    /// A continuation succeeded: append the reply and fold the refreshed
    /// thread into the matching history entry by conversation id.
    CompleteContinuation {
        chat_id: String,
        message: ChatMessage,
    },
    /// A request failed: drop both flags and record the message. The
    /// optimistic user turn stays in place.
    FailRequest(String),
    /// The reveal animation ran to completion.
    FinishReveal,
    /// Start a new conversation: clear the working thread.
    ClearThread,
    /// Load a past conversation into the working thread, as a copy.
    OpenThread { chat_id: String },
    HistoryLoading,
    ReplaceHistory(Vec<ChatThread>),
    HistoryFailed(String),
    ClearError,
}

fn transition(state: &mut SessionState, command: Command) {
    match command {
        Command::PushUser(message) => {
            state.current_thread.push(message);
        }
        Command::BeginRequest => {
            state.is_generating = true;
            state.is_streaming = true;
            state.error = None;
        }
        Command::CompleteGeneration {
            chat_id,
            message,
            title,
        } => {
            state.current_thread.push(message);
            state.current_chat_id = Some(chat_id.clone());
            state.is_generating = false;
            let entry = history::synthesize_thread(chat_id, title, state.current_thread.clone());
            state.chat_history.insert(0, entry);
        }
        Command::CompleteContinuation { chat_id, message } => {
            state.current_thread.push(message);
            state.is_generating = false;
            history::merge_into(
                &mut state.chat_history,
                &chat_id,
                state.current_thread.clone(),
            );
        }
        Command::FailRequest(message) => {
            state.is_generating = false;
            state.is_streaming = false;
            state.error = Some(message);
        }
        Command::FinishReveal => {
            state.is_streaming = false;
        }
        Command::ClearThread => {
            state.current_thread.clear();
            state.current_chat_id = None;
            state.is_streaming = false;
        }
        Command::OpenThread { chat_id } => {
            match state.chat_history.iter().find(|thread| thread.id == chat_id) {
                Some(thread) => {
                    state.current_thread = thread.messages.clone();
                    state.current_chat_id = Some(chat_id);
                    state.is_streaming = false;
                }
                None => {
                    tracing::warn!(chat_id = %chat_id, "ignoring OpenThread for unknown conversation");
                }
            }
        }
        Command::HistoryLoading => {
            state.history_loading = true;
        }
        Command::ReplaceHistory(threads) => {
            state.chat_history = threads;
            state.history_loading = false;
        }
        Command::HistoryFailed(message) => {
            state.history_loading = false;
            state.error = Some(message);
        }
        Command::ClearError => {
            state.error = None;
        }
    }
}

// ============================================
// Shared Handle
// ============================================

/// Cloneable handle to the single session state. Each `apply` takes the lock
/// once, runs one transition, and releases it, so readers only ever observe
/// complete states.
#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<SessionState>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, command: Command) {
        let mut state = self.lock();
        transition(&mut state, command);
    }

    pub fn snapshot(&self) -> SessionState {
        self.lock().clone()
    }

    pub fn is_generating(&self) -> bool {
        self.lock().is_generating
    }

    pub fn is_streaming(&self) -> bool {
        self.lock().is_streaming
    }

    pub fn current_chat_id(&self) -> Option<String> {
        self.lock().current_chat_id.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.inner.lock().expect("session state poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn handle_with_user_turn() -> SessionHandle {
        let session = SessionHandle::new();
        session.apply(Command::PushUser(ChatMessage::user("make me a story")));
        session.apply(Command::BeginRequest);
        session
    }

    #[test]
    fn begin_request_raises_flags_and_clears_error() {
        let session = SessionHandle::new();
        session.apply(Command::FailRequest("boom".into()));
        assert_eq!(session.error().as_deref(), Some("boom"));

        session.apply(Command::BeginRequest);
        let state = session.snapshot();
        assert!(state.is_generating);
        assert!(state.is_streaming);
        assert!(state.error.is_none());
    }

    #[test]
    fn complete_generation_appends_reply_and_prepends_history() {
        let session = handle_with_user_turn();
        session.apply(Command::CompleteGeneration {
            chat_id: "chat-1".into(),
            message: ChatMessage::assistant("a story"),
            title: "A Story".into(),
        });

        let state = session.snapshot();
        assert_eq!(state.current_thread.len(), 2);
        assert_eq!(state.current_thread[0].role, Role::User);
        assert_eq!(state.current_thread[1].role, Role::Assistant);
        assert_eq!(state.current_chat_id.as_deref(), Some("chat-1"));
        assert!(!state.is_generating);
        // streaming stays up until the revealer finishes
        assert!(state.is_streaming);
        assert_eq!(state.chat_history.len(), 1);
        assert_eq!(state.chat_history[0].id, "chat-1");
        assert_eq!(state.chat_history[0].title, "A Story");
        assert_eq!(state.chat_history[0].messages.len(), 2);
    }

    #[test]
    fn history_entry_does_not_alias_current_thread() {
        let session = handle_with_user_turn();
        session.apply(Command::CompleteGeneration {
            chat_id: "chat-1".into(),
            message: ChatMessage::assistant("a story"),
            title: "A Story".into(),
        });
        session.apply(Command::PushUser(ChatMessage::user("more please")));

        let state = session.snapshot();
        assert_eq!(state.current_thread.len(), 3);
        assert_eq!(state.chat_history[0].messages.len(), 2);
    }

    #[test]
    fn failure_drops_flags_and_keeps_optimistic_message() {
        let session = handle_with_user_turn();
        session.apply(Command::FailRequest("HTTP 500".into()));

        let state = session.snapshot();
        assert!(!state.is_generating);
        assert!(!state.is_streaming);
        assert_eq!(state.error.as_deref(), Some("HTTP 500"));
        assert_eq!(state.current_thread.len(), 1);
        assert_eq!(state.current_thread[0].role, Role::User);
    }

    #[test]
    fn continuation_merges_by_conversation_id() {
        let session = handle_with_user_turn();
        session.apply(Command::CompleteGeneration {
            chat_id: "chat-1".into(),
            message: ChatMessage::assistant("a story"),
            title: "A Story".into(),
        });

        session.apply(Command::PushUser(ChatMessage::user("continue")));
        session.apply(Command::BeginRequest);
        session.apply(Command::CompleteContinuation {
            chat_id: "chat-1".into(),
            message: ChatMessage::assistant("more story"),
        });

        let state = session.snapshot();
        assert_eq!(state.current_thread.len(), 4);
        assert_eq!(state.chat_history.len(), 1);
        assert_eq!(state.chat_history[0].messages.len(), 4);
    }

    #[test]
    fn open_thread_copies_messages_and_unknown_id_is_ignored() {
        let session = handle_with_user_turn();
        session.apply(Command::CompleteGeneration {
            chat_id: "chat-1".into(),
            message: ChatMessage::assistant("a story"),
            title: "A Story".into(),
        });
        session.apply(Command::ClearThread);
        assert!(session.snapshot().current_thread.is_empty());

        session.apply(Command::OpenThread {
            chat_id: "chat-1".into(),
        });
        let state = session.snapshot();
        assert_eq!(state.current_thread.len(), 2);
        assert_eq!(state.current_chat_id.as_deref(), Some("chat-1"));

        session.apply(Command::OpenThread {
            chat_id: "missing".into(),
        });
        assert_eq!(session.snapshot().current_thread.len(), 2);
    }
}
