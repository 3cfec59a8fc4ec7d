use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

use super::store::{TokenStore, TOKEN_SLOT};

const SERVICE_NAME: &str = "quizline";

/// Token store backed by the OS keychain.
///
/// Holds a single keychain entry for its whole life, so every read sees
/// the last write even on credential backends that keep state per entry.
pub struct KeyringTokenStore {
    service: String,
    entry: Entry,
}

impl KeyringTokenStore {
    pub fn new() -> Result<Self> {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a different keychain service name, e.g. one per backend host
    pub fn with_service(service: impl Into<String>) -> Result<Self> {
        let service = service.into();
        let entry = Entry::new(&service, TOKEN_SLOT).context("Failed to create keyring entry")?;
        Ok(Self { service, entry })
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self) -> Result<Option<String>> {
        match self.entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn set(&self, token: &str) -> Result<()> {
        self.entry
            .set_password(token)
            .context("Failed to store token in keychain")?;
        debug!(service = %self.service, "Token stored in keychain");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyring_store_round_trip() {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        let store = KeyringTokenStore::with_service("quizline-test").unwrap();

        assert_eq!(store.get().unwrap(), None);

        store.set("T1").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("T1"));

        store.set("T2").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("T2"));

        store.clear().unwrap();
        assert_eq!(store.get().unwrap(), None);

        // Clearing an empty entry is fine
        store.clear().unwrap();
    }
}
