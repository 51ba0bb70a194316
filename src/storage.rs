//! Persistent client-side state.
//!
//! Only two values survive restarts: the auth token and the chosen theme.
//! Conversation state is never persisted locally; it is rebuilt from the
//! history endpoint on each load.

use crate::types::ThemeMode;
use std::fs;
use std::path::PathBuf;

pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const THEME_KEY: &str = "theme";

/// File-per-key store rooted in the platform data directory.
pub struct ClientStorage {
    root: PathBuf,
}

impl ClientStorage {
    /// Open the store at the default platform location.
    pub fn open_default() -> Self {
        let root = match dirs::data_local_dir() {
            Some(data_dir) => data_dir.join("storyline"),
            None => PathBuf::from("cache").join("storyline"),
        };
        Self { root }
    }

    /// Open the store at an explicit root (tests point this at a temp dir).
    pub fn at(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.key_path(key)).ok()
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), String> {
        fs::create_dir_all(&self.root)
            .map_err(|e| format!("Failed to create storage directory: {}", e))?;
        fs::write(self.key_path(key), value).map_err(|e| format!("Failed to write storage: {}", e))
    }

    pub fn delete(&self, key: &str) -> Result<(), String> {
        let path = self.key_path(key);
        if path.exists() {
            fs::remove_file(path).map_err(|e| format!("Failed to delete from storage: {}", e))?;
        }
        Ok(())
    }

    pub fn auth_token(&self) -> Option<String> {
        self.get(AUTH_TOKEN_KEY).filter(|token| !token.is_empty())
    }

    pub fn theme(&self) -> ThemeMode {
        self.get(THEME_KEY)
            .and_then(|value| ThemeMode::parse(&value))
            .unwrap_or_default()
    }

    pub fn save_theme(&self, mode: ThemeMode) -> Result<(), String> {
        self.set(THEME_KEY, mode.as_str())
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.val", sanitize_key(key)))
    }
}

/// Sanitize storage key for filesystem use
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect()
}
