use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::identity::Identity;

const SESSION_FILE: &str = "session.json";

/// Signed-in session as returned by the auth API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Access token for API requests
    pub access_token: String,

    /// Refresh token for session renewal
    pub refresh_token: String,

    /// Token expiration timestamp (Unix timestamp)
    pub expires_at: i64,

    /// The user this session belongs to
    pub user: Identity,
}

impl Session {
    /// Check if the token needs refresh (within 5 minutes of expiry)
    pub fn needs_refresh(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        now >= self.expires_at - 300 // 5 minute buffer
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        now >= self.expires_at
    }
}

/// File-based storage for the auth session.
///
/// The session lives in `<dir>/session.json`, normally under the user's
/// config directory.
#[derive(Debug, Clone)]
pub struct SessionStorage {
    dir: PathBuf,
}

impl SessionStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Storage in `<config_dir>/checkin/tokens`
    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("checkin")
            .join("tokens");
        Ok(Self::new(dir))
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    /// Persist a session, replacing any previous one
    pub fn store(&self, session: &Session) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .context("Failed to create tokens directory")?;

        let path = self.session_path();
        let json = serde_json::to_string_pretty(session)
            .context("Failed to serialize session")?;

        fs::write(&path, &json)
            .context("Failed to write session file")?;

        tracing::info!("Stored session for user {} at {:?}", session.user.id, path);
        Ok(())
    }

    /// Load the stored session, `None` if there is none
    pub fn load(&self) -> Result<Option<Session>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)
            .context("Failed to read session file")?;

        let session: Session = serde_json::from_str(&json)
            .context("Failed to deserialize session")?;

        tracing::debug!("Loaded session for user {}", session.user.id);
        Ok(Some(session))
    }

    /// Delete the stored session
    pub fn delete(&self) -> Result<()> {
        let path = self.session_path();

        if path.exists() {
            fs::remove_file(&path)
                .context("Failed to delete session file")?;
            tracing::info!("Deleted stored session");
        }

        Ok(())
    }

    /// Check if a readable session is stored
    pub fn has_session(&self) -> bool {
        matches!(self.load(), Ok(Some(_)))
    }
}
