/// Backend service abstraction for the narrative API.
///
/// The engine treats the backend as an opaque service with four operations:
/// start a narrative, continue one, list past conversations, and report the
/// credit balance. Every failure surfaces as a single human-readable message
/// string; no structured error codes cross this boundary.
///
/// # Architecture
///
/// - `NarrativeBackend` - the trait the coordinator drives
/// - `http` - the reqwest implementation speaking the `/narratives/*` protocol
mod http;

pub use http::HttpBackend;

use crate::types::{NarrativeLength, NarrativeParameters, Role};
use async_trait::async_trait;
use std::fmt;

// ============================================
// Error Type
// ============================================

#[derive(Debug, Clone)]
pub struct BackendError(String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BackendError {}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::new(err.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::new(err.to_string())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

// ============================================
// Operation Payloads
// ============================================

/// Result of a generate or continue call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub chat_id: String,
    pub response_text: String,
}

/// One role-tagged message record as the history endpoint reports it.
/// Timestamps stay opaque strings until normalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

/// One raw conversation record. An explicit title is optional; when absent
/// the synchronizer derives one from the message contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawConversation {
    pub chat_id: String,
    pub title: Option<String>,
    pub messages: Vec<RawMessage>,
}

/// Authoritative credit balance plus the profile fields the credit endpoint
/// reports alongside it. Profile fields are display-only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreditSnapshot {
    pub remaining: i64,
    pub last_reset: String,
    pub name: String,
    pub email: String,
    pub public_id: String,
    pub profile_image: String,
}

// ============================================
// Backend Trait
// ============================================

#[async_trait]
pub trait NarrativeBackend: Send + Sync {
    /// Start a new narrative conversation from the brand parameters.
    async fn generate(
        &self,
        parameters: &NarrativeParameters,
        length: NarrativeLength,
    ) -> BackendResult<GenerationOutcome>;

    /// Append a follow-up instruction to an existing conversation.
    async fn continue_chat(&self, chat_id: &str, prompt: &str) -> BackendResult<GenerationOutcome>;

    /// List all past conversations for the signed-in user.
    async fn fetch_history(&self) -> BackendResult<Vec<RawConversation>>;

    /// Fetch the authoritative credit balance.
    async fn fetch_credits(&self) -> BackendResult<CreditSnapshot>;
}
