use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NarrativeLength {
    Short,
    Long,
}

impl NarrativeLength {
    pub fn as_str(self) -> &'static str {
        match self {
            NarrativeLength::Short => "short",
            NarrativeLength::Long => "long",
        }
    }
}

/// Brand parameters collected before the first generation request.
///
/// Serialized field names match the backend's camelCase protocol; the long
/// narrative extras are omitted from the request body when unset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeParameters {
    pub industry: String,
    pub brand_values: String,
    pub target_audience: String,
    pub brand_mission: String,
    pub unique_selling_proposition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone_of_voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_personality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub competitor_analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_positioning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_metrics: Option<String>,
}

/// Generation parameters a message was produced with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageMetadata {
    pub narrative_length: NarrativeLength,
    pub parameters: NarrativeParameters,
}

static MESSAGE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Issue the next message id. Ids are unique for the process lifetime and
/// strictly increase with creation order.
pub fn next_message_id() -> u64 {
    MESSAGE_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// One turn of a conversation. Content is immutable once created; only the
/// displayed projection of an assistant reply animates (see `reveal`).
#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub metadata: Option<MessageMetadata>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, None)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, None)
    }

    pub fn new(role: Role, content: impl Into<String>, metadata: Option<MessageMetadata>) -> Self {
        Self {
            id: next_message_id(),
            role,
            content: content.into(),
            created_at: OffsetDateTime::now_utc(),
            metadata,
        }
    }

    /// Rebuild a message from a server history record, keeping the server's
    /// id when it parses and falling back to a fresh local id otherwise.
    pub fn from_record(
        server_id: &str,
        role: Role,
        content: impl Into<String>,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            id: server_id.parse().unwrap_or_else(|_| next_message_id()),
            role,
            content: content.into(),
            created_at,
            metadata: None,
        }
    }
}

/// One past conversation. History entries are owned by the history list; the
/// active thread is always a working copy, never a reference into history.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatThread {
    pub id: String,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(ThemeMode::Light),
            "dark" => Some(ThemeMode::Dark),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        }
    }
}
