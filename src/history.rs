use crate::backend::{RawConversation, RawMessage};
use crate::types::{ChatMessage, ChatThread, Role};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const TITLE_MARKER: &str = "**Title of Narrative:**";
const NARRATIVE_MARKER: &str = "**Narrative:**";
const FALLBACK_TITLE: &str = "Untitled narrative";

// ============================================
// Normalization
// ============================================

/// Turn the backend's raw conversation records into display-ready threads,
/// sorted most-recently-updated first.
pub fn normalize(records: Vec<RawConversation>) -> Vec<ChatThread> {
    let mut threads: Vec<ChatThread> = records.into_iter().map(normalize_record).collect();
    threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    threads
}

fn normalize_record(record: RawConversation) -> ChatThread {
    let title = match &record.title {
        Some(explicit) => explicit.clone(),
        None => match record.messages.get(1) {
            Some(second) => derive_title(&second.content),
            None => record
                .messages
                .first()
                .map(|first| first.content.clone())
                .unwrap_or_else(|| FALLBACK_TITLE.to_string()),
        },
    };

    let created_at = record
        .messages
        .first()
        .map(|message| parse_timestamp(&message.created_at))
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);
    let updated_at = record
        .messages
        .last()
        .map(|message| parse_timestamp(&message.updated_at))
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);

    ChatThread {
        id: record.chat_id,
        title,
        messages: record.messages.iter().map(normalize_message).collect(),
        created_at,
        updated_at,
    }
}

fn normalize_message(record: &RawMessage) -> ChatMessage {
    let content = match record.role {
        Role::Assistant => strip_narrative_preamble(&record.content).to_string(),
        Role::User => record.content.clone(),
    };
    ChatMessage::from_record(
        &record.id,
        record.role,
        content,
        parse_timestamp(&record.updated_at),
    )
}

fn parse_timestamp(raw: &str) -> OffsetDateTime {
    OffsetDateTime::parse(raw, &Rfc3339).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

// ============================================
// Title and Content Derivation
// ============================================

/// Derive a conversation title from assistant content: the remainder of the
/// `**Title of Narrative:**` line, trimmed and unquoted. Falls back to the
/// content verbatim when the marker is absent.
pub fn derive_title(content: &str) -> String {
    if let Some(start) = content.find(TITLE_MARKER) {
        let rest = &content[start + TITLE_MARKER.len()..];
        let line = rest.lines().next().unwrap_or("");
        let title = line.trim().trim_matches('"').trim();
        if !title.is_empty() {
            return title.to_string();
        }
    }
    content.to_string()
}

/// Drop any leading preamble up to and including the `**Narrative:**` marker
/// (case-insensitive). Content without the marker passes through unchanged.
pub fn strip_narrative_preamble(content: &str) -> &str {
    match find_ignore_ascii_case(content, NARRATIVE_MARKER) {
        Some(start) => content[start + NARRATIVE_MARKER.len()..].trim_start(),
        None => content,
    }
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

// ============================================
// Local Synthesis and Merge
// ============================================

/// Build a history entry client-side after a successful generation. The
/// entry is provisional: the next full fetch replaces it with the server's
/// view, reconciled by conversation id.
pub fn synthesize_thread(chat_id: String, title: String, messages: Vec<ChatMessage>) -> ChatThread {
    let now = OffsetDateTime::now_utc();
    ChatThread {
        id: chat_id,
        title,
        messages,
        created_at: now,
        updated_at: now,
    }
}

/// Fold a refreshed working thread into the history entry with the matching
/// conversation id, bumping its `updated_at`. A continuation of a thread
/// history does not know yet gets a provisional entry instead.
pub fn merge_into(history: &mut Vec<ChatThread>, chat_id: &str, messages: Vec<ChatMessage>) {
    match history.iter_mut().find(|thread| thread.id == chat_id) {
        Some(thread) => {
            thread.messages = messages;
            thread.updated_at = OffsetDateTime::now_utc();
        }
        None => {
            let title = messages
                .get(1)
                .map(|second| derive_title(&second.content))
                .unwrap_or_else(|| FALLBACK_TITLE.to_string());
            let entry = synthesize_thread(chat_id.to_string(), title, messages);
            history.insert(0, entry);
        }
    }
}
