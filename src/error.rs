use crate::backend::BackendError;

/// Failures the engine reports to callers.
///
/// Quota refusals never reach the network; request failures carry the single
/// human-readable message that is also recorded in the session state.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("You have no credits remaining. Please upgrade your plan.")]
    QuotaExceeded,

    #[error("{0}")]
    RequestFailed(String),
}

impl From<BackendError> for EngineError {
    fn from(err: BackendError) -> Self {
        EngineError::RequestFailed(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
