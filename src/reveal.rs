use crate::session::{Command, SessionHandle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// One character is appended to the display buffer per tick.
pub const REVEAL_TICK: Duration = Duration::from_millis(10);

#[derive(Default)]
struct RevealState {
    text: String,
    cancelled: bool,
    done: bool,
}

/// A running reveal of one assistant reply.
///
/// The stored message content is complete the moment it arrives; only this
/// displayed projection grows, one character per tick. A reveal runs to
/// completion or is disposed; it is never restarted. Disposal is checked
/// under the same lock as every buffer write, so once [`Reveal::dispose`]
/// returns nothing is written again.
pub struct Reveal {
    state: Arc<Mutex<RevealState>>,
    task: JoinHandle<()>,
}

/// Spawn the reveal timer for a freshly appended assistant reply. On natural
/// completion it clears the session's streaming flag; a disposed reveal
/// leaves the flag to whoever disposed it.
pub fn start_reveal(content: &str, tick: Duration, session: SessionHandle) -> Reveal {
    let state = Arc::new(Mutex::new(RevealState::default()));
    let writer = Arc::clone(&state);
    let chars: Vec<char> = content.chars().collect();

    let task = tokio::spawn(async move {
        for ch in chars {
            tokio::time::sleep(tick).await;
            let mut guard = writer.lock().expect("reveal state poisoned");
            if guard.cancelled {
                return;
            }
            guard.text.push(ch);
        }
        {
            let mut guard = writer.lock().expect("reveal state poisoned");
            if guard.cancelled {
                return;
            }
            guard.done = true;
        }
        session.apply(Command::FinishReveal);
    });

    Reveal { state, task }
}

impl Reveal {
    /// Current prefix and whether the reveal has run to completion.
    pub fn snapshot(&self) -> (String, bool) {
        let guard = self.state.lock().expect("reveal state poisoned");
        (guard.text.clone(), guard.done)
    }

    pub fn is_done(&self) -> bool {
        self.state.lock().expect("reveal state poisoned").done
    }

    /// Stop the timer. No further writes happen after this returns. Must be
    /// called when the owning view goes away or the active thread changes.
    pub fn dispose(&self) {
        let mut guard = self.state.lock().expect("reveal state poisoned");
        guard.cancelled = true;
        drop(guard);
        self.task.abort();
    }
}

impl Drop for Reveal {
    fn drop(&mut self) {
        self.dispose();
    }
}
