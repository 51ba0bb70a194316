use crate::backend::CreditSnapshot;
use std::sync::Mutex;

/// Local credit bookkeeping.
///
/// The authoritative balance lives server-side; this is an optimistic cache.
/// The balance may transiently go negative between a consumed request and the
/// next refresh, so display layers clamp through [`CreditGuard::displayed`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreditState {
    pub remaining: i64,
    pub last_reset: String,
}

pub struct CreditGuard {
    state: Mutex<CreditState>,
}

impl Default for CreditGuard {
    fn default() -> Self {
        Self::new(CreditState::default())
    }
}

impl CreditGuard {
    pub fn new(state: CreditState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Whether a new submission may be issued.
    pub fn can_submit(&self) -> bool {
        self.lock().remaining > 0
    }

    /// Record one consumed credit. Called exactly once per successfully
    /// completed generation or continuation, never on failure. No floor.
    pub fn note_consumed(&self) {
        self.lock().remaining -= 1;
    }

    /// Overwrite the local cache with an authoritative snapshot. No merge.
    pub fn replace(&self, snapshot: &CreditSnapshot) {
        *self.lock() = CreditState {
            remaining: snapshot.remaining,
            last_reset: snapshot.last_reset.clone(),
        };
    }

    pub fn remaining(&self) -> i64 {
        self.lock().remaining
    }

    /// Balance clamped for display; the raw value may be negative.
    pub fn displayed(&self) -> i64 {
        self.lock().remaining.max(0)
    }

    pub fn snapshot(&self) -> CreditState {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CreditState> {
        self.state.lock().expect("credit state poisoned")
    }
}
