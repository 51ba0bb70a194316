//! Sign-in handoff.
//!
//! The OAuth flow itself happens elsewhere; this module only consumes its
//! output: a redirect query string carrying `accessToken` and a
//! percent-encoded `user` JSON payload. The token is persisted; a user
//! payload that fails to parse is logged and dropped, never surfaced.

use crate::storage::{AUTH_TOKEN_KEY, ClientStorage};
use serde::Deserialize;
use url::form_urlencoded;

/// Profile fields delivered alongside the access token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub public_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectCredentials {
    pub token: String,
    pub user: Option<UserProfile>,
}

/// Extract credentials from a redirect query string ("a=1&b=2" form, leading
/// '?' tolerated). Returns `None` when no access token is present.
pub fn parse_redirect_query(query: &str) -> Option<RedirectCredentials> {
    let query = query.strip_prefix('?').unwrap_or(query);

    let mut token = None;
    let mut user_payload = None;
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "accessToken" => token = Some(value.into_owned()),
            "user" => user_payload = Some(value.into_owned()),
            _ => {}
        }
    }

    let token = token.filter(|t| !t.is_empty())?;
    let user = user_payload.and_then(|raw| match serde_json::from_str::<UserProfile>(&raw) {
        Ok(profile) => Some(profile),
        Err(err) => {
            tracing::warn!(error = %err, "ignoring malformed user payload from redirect");
            None
        }
    });

    Some(RedirectCredentials { token, user })
}

/// Persist the handed-off token so later sessions stay signed in.
pub fn store_credentials(
    storage: &ClientStorage,
    credentials: &RedirectCredentials,
) -> Result<(), String> {
    storage.set(AUTH_TOKEN_KEY, &credentials.token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_and_user_payload() {
        let query = "accessToken=tok-1&user=%7B%22id%22%3A%221%22%2C%22email%22%3A%22a%40b.c%22%2C%22name%22%3A%22Ada%22%7D";
        let credentials = parse_redirect_query(query).unwrap();
        assert_eq!(credentials.token, "tok-1");
        let user = credentials.user.unwrap();
        assert_eq!(user.name, "Ada");
        assert_eq!(user.email, "a@b.c");
    }

    #[test]
    fn malformed_user_payload_is_dropped_silently() {
        let query = "accessToken=tok-1&user=%7Bnot-json";
        let credentials = parse_redirect_query(query).unwrap();
        assert_eq!(credentials.token, "tok-1");
        assert!(credentials.user.is_none());
    }

    #[test]
    fn missing_token_yields_nothing() {
        assert!(parse_redirect_query("user=%7B%7D").is_none());
        assert!(parse_redirect_query("").is_none());
        assert!(parse_redirect_query("accessToken=").is_none());
    }

    #[test]
    fn leading_question_mark_is_tolerated() {
        let credentials = parse_redirect_query("?accessToken=tok-2").unwrap();
        assert_eq!(credentials.token, "tok-2");
        assert!(credentials.user.is_none());
    }
}
