use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No token available")]
    NoCredential,

    #[error("Network error - please check your connection")]
    Network(#[source] reqwest::Error),

    #[error("Unauthorized - please log in again")]
    Unauthorized,

    #[error("Session expired")]
    SessionExpired,

    #[error("Credential store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    LoginFailed(String),

    #[error("{0}")]
    RegistrationFailed(String),

    #[error("Failed to update {failed} question(s)")]
    PartialFailure { failed: usize, total: usize },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// True for the two terminal authorization failures. Both leave the
    /// credential store empty, so the caller has to log in again.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ApiError::NoCredential | ApiError::Unauthorized | ApiError::SessionExpired
        )
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}
