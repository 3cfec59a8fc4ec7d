use std::sync::Mutex;

use anyhow::{anyhow, Result};

/// Fixed slot name the token is stored under.
pub const TOKEN_SLOT: &str = "token";

/// Shared storage for the current bearer token.
///
/// Implementations are shared between clones of the request client, so
/// they must be safe to call from several tasks at once.
pub trait TokenStore: Send + Sync {
    /// Read the current token, `None` when logged out
    fn get(&self) -> Result<Option<String>>;

    /// Replace the current token
    fn set(&self, token: &str) -> Result<()>;

    /// Remove the token (logout)
    fn clear(&self) -> Result<()>;
}

/// In-memory token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Result<Option<String>> {
        let guard = self.token.lock().map_err(|_| anyhow!("token store poisoned"))?;
        Ok(guard.clone())
    }

    fn set(&self, token: &str) -> Result<()> {
        let mut guard = self.token.lock().map_err(|_| anyhow!("token store poisoned"))?;
        *guard = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self.token.lock().map_err(|_| anyhow!("token store poisoned"))?;
        *guard = None;
        Ok(())
    }
}
