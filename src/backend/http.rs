use super::{
    BackendError, BackendResult, CreditSnapshot, GenerationOutcome, NarrativeBackend,
    RawConversation, RawMessage,
};
use crate::types::{NarrativeLength, NarrativeParameters, Role};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "http://localhost:3001/api";

/// reqwest client for the narrative service. Bearer auth is attached when a
/// token is available; the base URL comes from `NARRATIVE_API_BASE_URL`.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            auth_token,
        }
    }

    pub fn from_env(auth_token: Option<String>) -> Self {
        let base_url = std::env::var("NARRATIVE_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url, auth_token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> BackendResult<String> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(BackendError::new(error_message(status, &body)))
        }
    }

    async fn get_json(&self, path: &str) -> BackendResult<String> {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(BackendError::new(error_message(status, &body)))
        }
    }
}

/// Prefer the server's own message field; otherwise report the bare status.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    #[derive(Deserialize)]
    struct ServerError {
        message: String,
    }

    match serde_json::from_str::<ServerError>(body) {
        Ok(parsed) => parsed.message,
        Err(_) => format!("HTTP {}", status.as_u16()),
    }
}

// ============================================
// Wire Shapes
// ============================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(flatten)]
    parameters: &'a NarrativeParameters,
    usp: &'a str,
    narrative_length: NarrativeLength,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContinueRequest<'a> {
    chat_id: &'a str,
    new_instruction: &'a str,
}

#[derive(Deserialize)]
struct GenerationBody {
    response: String,
    #[serde(rename = "chatId")]
    chat_id: String,
}

#[derive(Deserialize)]
struct GenerationEnvelope {
    data: GenerationBody,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreditsBody {
    credits: i64,
    last_credit_reset: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    public_id: String,
    #[serde(default)]
    profile_image: String,
}

#[derive(Deserialize)]
struct CreditsEnvelope {
    data: CreditsBody,
}

#[derive(Deserialize)]
struct WireMessageContent {
    content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireHistoryMessage {
    id: u64,
    chat: WireMessageContent,
    message_role: Role,
    created_at: String,
    updated_at: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireConversation {
    chat_id: String,
    chats: Vec<WireHistoryMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEnvelope {
    all_chats: Vec<WireConversation>,
}

fn parse_generation(body: &str) -> BackendResult<GenerationOutcome> {
    let envelope: GenerationEnvelope = serde_json::from_str(body)?;
    Ok(GenerationOutcome {
        chat_id: envelope.data.chat_id,
        response_text: envelope.data.response,
    })
}

fn parse_history(body: &str) -> BackendResult<Vec<RawConversation>> {
    let envelope: HistoryEnvelope = serde_json::from_str(body)?;
    Ok(envelope
        .all_chats
        .into_iter()
        .map(|conversation| RawConversation {
            chat_id: conversation.chat_id,
            title: None,
            messages: conversation
                .chats
                .into_iter()
                .map(|message| RawMessage {
                    id: message.id.to_string(),
                    role: message.message_role,
                    content: message.chat.content,
                    created_at: message.created_at,
                    updated_at: message.updated_at,
                })
                .collect(),
        })
        .collect())
}

fn parse_credits(body: &str) -> BackendResult<CreditSnapshot> {
    let envelope: CreditsEnvelope = serde_json::from_str(body)?;
    Ok(CreditSnapshot {
        remaining: envelope.data.credits,
        last_reset: envelope.data.last_credit_reset,
        name: envelope.data.name,
        email: envelope.data.email,
        public_id: envelope.data.public_id,
        profile_image: envelope.data.profile_image,
    })
}

#[async_trait]
impl NarrativeBackend for HttpBackend {
    async fn generate(
        &self,
        parameters: &NarrativeParameters,
        length: NarrativeLength,
    ) -> BackendResult<GenerationOutcome> {
        let body = self
            .post_json(
                "/narratives/generate",
                &GenerateRequest {
                    parameters,
                    usp: &parameters.unique_selling_proposition,
                    narrative_length: length,
                },
            )
            .await?;
        parse_generation(&body)
    }

    async fn continue_chat(&self, chat_id: &str, prompt: &str) -> BackendResult<GenerationOutcome> {
        let body = self
            .post_json(
                "/narratives/continueChat",
                &ContinueRequest {
                    chat_id,
                    new_instruction: prompt,
                },
            )
            .await?;
        parse_generation(&body)
    }

    async fn fetch_history(&self) -> BackendResult<Vec<RawConversation>> {
        let body = self.get_json("/narratives/userChats").await?;
        parse_history(&body)
    }

    async fn fetch_credits(&self) -> BackendResult<CreditSnapshot> {
        let body = self.get_json("/narratives/userCredits").await?;
        parse_credits(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generation_envelope() {
        let body = r#"{"data":{"response":"Once upon a brand","chatId":"chat-7"}}"#;
        let outcome = parse_generation(body).unwrap();
        assert_eq!(outcome.chat_id, "chat-7");
        assert_eq!(outcome.response_text, "Once upon a brand");
    }

    #[test]
    fn parses_history_envelope() {
        let body = r#"{"allChats":[{"chatId":"chat-1","chats":[
            {"id":10,"chat":{"role":"user","content":"hi"},"messageRole":"user",
             "createdAt":"2024-01-01T00:00:00Z","updatedAt":"2024-01-01T00:00:00Z"},
            {"id":11,"chat":{"role":"assistant","content":"hello"},"messageRole":"assistant",
             "createdAt":"2024-01-01T00:00:05Z","updatedAt":"2024-01-01T00:00:05Z"}
        ]}]}"#;
        let conversations = parse_history(body).unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].chat_id, "chat-1");
        assert_eq!(conversations[0].messages.len(), 2);
        assert_eq!(conversations[0].messages[0].id, "10");
        assert_eq!(conversations[0].messages[1].role, Role::Assistant);
        assert_eq!(conversations[0].messages[1].content, "hello");
    }

    #[test]
    fn parses_credits_envelope() {
        let body = r#"{"data":{"credits":3,"lastCreditReset":"2024-02-01T00:00:00Z",
            "name":"Ada","email":"ada@example.com","publicId":"u-1","profileImage":""}}"#;
        let snapshot = parse_credits(body).unwrap();
        assert_eq!(snapshot.remaining, 3);
        assert_eq!(snapshot.last_reset, "2024-02-01T00:00:00Z");
        assert_eq!(snapshot.name, "Ada");
    }

    #[test]
    fn error_message_prefers_server_message() {
        let status = reqwest::StatusCode::PAYMENT_REQUIRED;
        assert_eq!(
            error_message(status, r#"{"message":"credits exhausted"}"#),
            "credits exhausted"
        );
        assert_eq!(error_message(status, "not json"), "HTTP 402");
    }
}
