use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::store::TokenStore;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Token lifetime in hours.
/// The quiz backend issues access tokens valid for 24 hours.
const TOKEN_EXPIRY_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub token: String,
    #[serde(default)]
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(token: impl Into<String>, username: Option<String>) -> Self {
        Self {
            token: token.into(),
            username,
            created_at: Utc::now(),
        }
    }

    /// Best-effort local estimate; the server is the authority and answers
    /// with an expiry 401 that the request client refreshes.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::hours(TOKEN_EXPIRY_HOURS)
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at() - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

/// Token store persisted as `session.json` in the cache directory.
///
/// Every read goes to disk, so a login or logout from another process is
/// picked up on the next request.
pub struct FileTokenStore {
    cache_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }

    /// Load session from disk. Expired sessions are returned as well.
    pub fn load(&self) -> Result<Option<SessionData>> {
        Self::read_file(&self.session_path())
    }

    /// Save session to disk
    pub fn save(&self, data: &SessionData) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| anyhow!("session lock poisoned"))?;
        self.write_file(data)
    }

    /// Record which user the stored token belongs to
    pub fn set_username(&self, username: &str) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| anyhow!("session lock poisoned"))?;
        if let Some(mut data) = Self::read_file(&self.session_path())? {
            data.username = Some(username.to_string());
            self.write_file(&data)?;
        }
        Ok(())
    }

    fn read_file(path: &Path) -> Result<Option<SessionData>> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to read session file"),
        };
        let data: SessionData =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(data))
    }

    fn write_file(&self, data: &SessionData) -> Result<()> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(data)?;

        // Readers in other processes never see a half-written file
        let staging = path.with_extension(format!("json.{}.tmp", std::process::id()));
        std::fs::write(&staging, contents).context("Failed to write session file")?;
        if let Err(e) = std::fs::rename(&staging, &path) {
            let _ = std::fs::remove_file(&staging);
            return Err(e).context("Failed to replace session file");
        }
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Result<Option<String>> {
        Ok(self.load()?.map(|data| data.token))
    }

    fn set(&self, token: &str) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| anyhow!("session lock poisoned"))?;
        // Keep the username across refreshes
        let username = Self::read_file(&self.session_path())
            .ok()
            .flatten()
            .and_then(|data| data.username);
        self.write_file(&SessionData::new(token, username))?;
        debug!("Session token saved");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| anyhow!("session lock poisoned"))?;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}
