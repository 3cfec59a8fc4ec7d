//! Typed bindings for the quiz REST API.
//!
//! `login` and `register` are plain requests. Everything under `/api` goes
//! through `AuthenticatedClient::call`, so expired tokens are refreshed
//! transparently and authorization failures log the user out.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::authed::REQUEST_TIMEOUT_SECS;
use super::{ApiError, AuthenticatedClient, RequestDescriptor};
use crate::auth::TokenStore;
use crate::models::submission::SubmitRequest;
use crate::models::{
    Answers, Level, LevelUpdate, QuestionCatalog, QuestionSet, QuizAttempt, SubmissionResult,
    UserProgress,
};

// ============================================================================
// Constants
// ============================================================================

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LENGTH: usize = 6;

const LOGIN_PATH: &str = "/login";
const REGISTER_PATH: &str = "/register";
const REFRESH_PATH: &str = "/refresh-token";
const QUESTIONS_PATH: &str = "/api/questions";
const SUBMIT_PATH: &str = "/api/submit";
const HISTORY_PATH: &str = "/api/quiz-history";
const ALL_QUESTIONS_PATH: &str = "/api/all-questions";
const UPDATE_LEVEL_PATH: &str = "/api/update-question-level";
const PROGRESS_PATH: &str = "/api/user-progress";

#[derive(Debug, Serialize)]
struct CredentialsBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateLevelBody {
    question_id: i64,
    level: Level,
}

/// Successful `POST /login` payload
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Token lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// API client for the quiz backend.
/// Clone is cheap - clones share the connection pool and token store.
#[derive(Clone)]
pub struct QuizClient {
    base_url: String,
    auth: AuthenticatedClient,
}

impl QuizClient {
    /// Create a client for `base_url` with the default timeout
    pub fn new(base_url: &str, store: Arc<dyn TokenStore>) -> Result<Self> {
        Self::with_timeout(base_url, store, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, store: Arc<dyn TokenStore>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let refresh_url = format!("{}{}", base_url, REFRESH_PATH);
        let auth = AuthenticatedClient::with_timeout(store, refresh_url, timeout)?;
        Ok(Self { base_url, auth })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The authenticated request client, for login state and raw calls
    pub fn auth(&self) -> &AuthenticatedClient {
        &self.auth
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ===== Account =====

    /// Log in and store the issued token
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        validate_credentials(username, password)?;

        let response = self
            .auth
            .http()
            .post(self.url(LOGIN_PATH))
            .json(&CredentialsBody { username, password })
            .send()
            .await
            .map_err(ApiError::Network)?;

        let status = response.status();
        let body = read_json_or_empty(response).await;
        if !status.is_success() {
            let message = message_from(&body, &["message"]).unwrap_or("Login failed");
            warn!(username, %status, "Login rejected");
            return Err(ApiError::LoginFailed(message.to_string()));
        }

        let login: LoginResponse = serde_json::from_value(body)
            .map_err(|e| ApiError::InvalidResponse(format!("login response: {}", e)))?;
        self.auth.login(&login.access_token)?;
        info!(username, "Login successful");
        Ok(login)
    }

    /// Create an account. Returns the server's confirmation message.
    pub async fn register(&self, username: &str, password: &str) -> Result<String, ApiError> {
        validate_credentials(username, password)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ApiError::Validation(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            )));
        }

        let response = self
            .auth
            .http()
            .post(self.url(REGISTER_PATH))
            .json(&CredentialsBody { username, password })
            .send()
            .await
            .map_err(ApiError::Network)?;

        let status = response.status();
        let body = read_json_or_empty(response).await;
        if !status.is_success() {
            let message = message_from(&body, &["message"]).unwrap_or("Registration failed");
            return Err(ApiError::RegistrationFailed(message.to_string()));
        }

        info!(username, "Registration successful");
        Ok(message_from(&body, &["message"])
            .unwrap_or("Registered")
            .to_string())
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        self.auth.logout()
    }

    // ===== Quiz =====

    /// Fetch the questions for the user's current level
    pub async fn questions(&self) -> Result<QuestionSet, ApiError> {
        let request = RequestDescriptor::get(self.url(QUESTIONS_PATH));
        let response = self.auth.call(&request).await?;
        parse_or_reject(response, &["error", "msg"], "Failed to load questions").await
    }

    /// Submit selected options for grading
    pub async fn submit(&self, answers: &Answers) -> Result<SubmissionResult, ApiError> {
        let request = RequestDescriptor::post(self.url(SUBMIT_PATH))
            .json(&SubmitRequest::new(answers))
            .map_err(|e| ApiError::Validation(format!("Could not encode answers: {}", e)))?;
        debug!(count = answers.len(), "Submitting answers");
        let response = self.auth.call(&request).await?;
        parse_or_reject(response, &["error", "msg"], "Quiz submission failed").await
    }

    /// Past attempts, newest first
    pub async fn history(&self) -> Result<Vec<QuizAttempt>, ApiError> {
        let request = RequestDescriptor::get(self.url(HISTORY_PATH));
        let response = self.auth.call(&request).await?;
        parse_or_reject(response, &["message", "error"], "Failed to load history").await
    }

    /// Per-level progress and unlock state
    pub async fn user_progress(&self) -> Result<UserProgress, ApiError> {
        let request = RequestDescriptor::get(self.url(PROGRESS_PATH));
        let response = self.auth.call(&request).await?;
        parse_or_reject(response, &["error"], "Failed to load progress").await
    }

    // ===== Level administration =====

    /// Every question across all levels
    pub async fn all_questions(&self) -> Result<QuestionCatalog, ApiError> {
        let request = RequestDescriptor::get(self.url(ALL_QUESTIONS_PATH));
        let response = self.auth.call(&request).await?;
        parse_or_reject(response, &["error"], "Failed to load questions").await
    }

    /// Move one question to another level
    pub async fn update_question_level(
        &self,
        question_id: i64,
        level: Level,
    ) -> Result<LevelUpdate, ApiError> {
        let request = RequestDescriptor::put(self.url(UPDATE_LEVEL_PATH))
            .json(&UpdateLevelBody { question_id, level })
            .map_err(|e| ApiError::Validation(format!("Could not encode level update: {}", e)))?;
        let response = self.auth.call(&request).await?;
        parse_or_reject(response, &["error"], "Failed to update question level").await
    }

    /// Send every level change at once and wait for all of them.
    ///
    /// Authorization and network errors abort with that error. Otherwise
    /// rejected updates are counted and reported together.
    pub async fn save_level_changes(&self, changes: &[(i64, Level)]) -> Result<usize, ApiError> {
        let updates = changes
            .iter()
            .map(|&(id, level)| self.update_question_level(id, level));
        let results = join_all(updates).await;

        let mut failed = 0;
        for result in results {
            match result {
                Ok(update) => debug!(question_id = update.question_id, "Level updated"),
                Err(e) if e.requires_login() || e.is_network() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Level update failed");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(ApiError::PartialFailure {
                failed,
                total: changes.len(),
            });
        }
        info!(count = changes.len(), "Saved level changes");
        Ok(changes.len())
    }
}

fn validate_credentials(username: &str, password: &str) -> Result<(), ApiError> {
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::Validation(
            "Please enter both username and password".to_string(),
        ));
    }
    Ok(())
}

/// Read a body as JSON, falling back to an empty object
async fn read_json_or_empty(response: Response) -> Value {
    response
        .json()
        .await
        .unwrap_or_else(|_| Value::Object(Default::default()))
}

/// First non-empty string among `fields`
fn message_from<'a>(body: &'a Value, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .filter_map(|field| body.get(*field).and_then(Value::as_str))
        .find(|message| !message.is_empty())
}

/// Decode a successful response, or turn a failed one into `Rejected`
async fn parse_or_reject<T: DeserializeOwned>(
    response: Response,
    message_fields: &[&str],
    default_message: &str,
) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(rejection(status, response, message_fields, default_message).await);
    }

    let text = response
        .text()
        .await
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to read body: {}", e)))?;
    serde_json::from_str(&text).map_err(|e| {
        warn!(error = %e, body = %ApiError::truncate_body(&text), "Unexpected response shape");
        ApiError::InvalidResponse(e.to_string())
    })
}

async fn rejection(
    status: StatusCode,
    response: Response,
    message_fields: &[&str],
    default_message: &str,
) -> ApiError {
    let body = read_json_or_empty(response).await;
    let message = message_from(&body, message_fields)
        .unwrap_or(default_message)
        .to_string();
    warn!(%status, %message, "Request rejected");
    ApiError::Rejected { status, message }
}
