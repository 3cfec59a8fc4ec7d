//! Credential storage for the bearer token.
//!
//! This module provides:
//! - `TokenStore`: the get/set/clear contract the request client depends on
//! - `MemoryTokenStore`: process-local store, used by tests and embedders
//! - `FileTokenStore`: session file in the cache directory
//! - `KeyringTokenStore`: OS-level keychain entry via keyring
//!
//! Expired tokens are kept on purpose: the refresh endpoint needs the
//! expired token as its bearer credential.

pub mod credentials;
pub mod session;
pub mod store;

pub use credentials::KeyringTokenStore;
pub use session::{FileTokenStore, SessionData};
pub use store::{MemoryTokenStore, TokenStore, TOKEN_SLOT};
