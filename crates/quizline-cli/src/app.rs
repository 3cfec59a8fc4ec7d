//! Application context shared by every command.
//!
//! Wires the config, token store, API client and cache together.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use quizline_core::auth::{FileTokenStore, KeyringTokenStore, TokenStore};
use quizline_core::cache::CacheManager;
use quizline_core::{Config, QuizClient, TokenBackend};

pub struct App {
    pub config: Config,
    pub client: QuizClient,
    pub cache: CacheManager,
    /// Set when the token lives in the session file
    session: Option<Arc<FileTokenStore>>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let cache_dir = config.cache_dir()?;
        let cache = CacheManager::new(cache_dir.clone()).context("Failed to open cache directory")?;

        let (store, session): (Arc<dyn TokenStore>, _) = match config.token_backend {
            TokenBackend::File => {
                let session = Arc::new(FileTokenStore::new(cache_dir));
                let store: Arc<dyn TokenStore> = session.clone();
                (store, Some(session))
            }
            TokenBackend::Keyring => (Arc::new(KeyringTokenStore::new()?), None),
        };
        debug!(backend = ?config.token_backend, base_url = config.base_url(), "Token store ready");

        let client = QuizClient::with_timeout(config.base_url(), store, config.request_timeout())?;
        Ok(Self {
            config,
            client,
            cache,
            session,
        })
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.client.auth().current_token(), Ok(Some(_)))
    }

    /// Remember who logged in, for the next prompt and for `status`
    pub fn remember_user(&mut self, username: &str) {
        self.config.last_username = Some(username.to_string());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
        if let Some(ref session) = self.session {
            if let Err(e) = session.set_username(username) {
                warn!(error = %e, "Failed to record session user");
            }
        }
    }

    /// Local view of the stored session, when it is kept in a file
    pub fn session_summary(&self) -> Option<String> {
        let session = self.session.as_ref()?;
        match session.load() {
            Ok(Some(data)) => {
                let user = data.username.as_deref().unwrap_or("unknown user");
                if data.is_expired() {
                    Some(format!("{} (token expired locally, will refresh on next request)", user))
                } else {
                    Some(format!("{} (token valid for ~{} more minutes)", user, data.minutes_until_expiry()))
                }
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read session");
                None
            }
        }
    }

    pub fn logout(&self) -> Result<()> {
        self.client.logout()?;
        self.cache.clear()?;
        info!("Session and cache cleared");
        Ok(())
    }
}
