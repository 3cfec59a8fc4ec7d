//! Bearer-authenticated requests with one transparent token refresh.
//!
//! Every protected call reads the token from the injected `TokenStore`.
//! When the server answers 401 and the body says the token has expired,
//! the client exchanges the expired token at the refresh endpoint and
//! re-sends the original request exactly once. Any other 401 logs the user
//! out.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use reqwest::header::{self, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use super::{ApiError, RequestDescriptor};
use crate::auth::TokenStore;

/// HTTP request timeout in seconds.
/// The backend has no long-running endpoints; 30s is plenty.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// `msg` the backend sends with a 401 for an expired token
const EXPIRED_TOKEN_MESSAGE: &str = "Token has expired";

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

/// Request client that attaches the stored bearer token.
/// Clone is cheap: clones share the connection pool, the token store, the
/// credential channel and the refresh gate.
#[derive(Clone)]
pub struct AuthenticatedClient {
    client: Client,
    store: Arc<dyn TokenStore>,
    refresh_url: String,
    state: Arc<watch::Sender<Option<String>>>,
    refresh_gate: Arc<Mutex<()>>,
}

impl AuthenticatedClient {
    /// Create a client with the default timeout
    pub fn new(store: Arc<dyn TokenStore>, refresh_url: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_timeout(store, refresh_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(
        store: Arc<dyn TokenStore>,
        refresh_url: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_http_client(client, store, refresh_url))
    }

    /// Build on an existing reqwest client, sharing its connection pool
    pub fn with_http_client(
        client: Client,
        store: Arc<dyn TokenStore>,
        refresh_url: impl Into<String>,
    ) -> Self {
        let initial = store.get().unwrap_or_else(|e| {
            warn!(error = %e, "Could not read stored token");
            None
        });
        let (state, _) = watch::channel(initial);
        Self {
            client,
            store,
            refresh_url: refresh_url.into(),
            state: Arc::new(state),
            refresh_gate: Arc::new(Mutex::new(())),
        }
    }

    /// The underlying HTTP client, for unauthenticated endpoints
    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Current token as seen by the store
    pub fn current_token(&self) -> Result<Option<String>, ApiError> {
        self.store.get().map_err(ApiError::Store)
    }

    /// Watch login, refresh and logout. The receiver always holds the
    /// latest known token.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.state.subscribe()
    }

    /// Persist a freshly issued token
    pub fn login(&self, token: &str) -> Result<(), ApiError> {
        self.store.set(token).map_err(ApiError::Store)?;
        self.state.send_replace(Some(token.to_string()));
        info!("Logged in");
        Ok(())
    }

    /// Drop the stored token
    pub fn logout(&self) -> Result<(), ApiError> {
        self.store.clear().map_err(ApiError::Store)?;
        self.state.send_replace(None);
        info!("Logged out");
        Ok(())
    }

    /// Send `request` with the stored bearer token.
    ///
    /// Returns the response for every status except 401. A 401 whose body
    /// signals expiry triggers one refresh followed by one retry, and the
    /// retry's response is returned whatever its status. Any other 401,
    /// or a failed refresh, clears the stored token.
    pub async fn call(&self, request: &RequestDescriptor) -> Result<Response, ApiError> {
        let token = self.current_token()?.ok_or(ApiError::NoCredential)?;

        let response = self.send(request, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let body = Self::read_auth_failure(response).await;
        if !is_expiry_signal(&body) {
            warn!(url = request.url(), "Request rejected with invalid token");
            self.force_logout();
            return Err(ApiError::Unauthorized);
        }

        debug!(url = request.url(), "Token expired, refreshing");
        let fresh = self.refresh_once(&token).await?;
        self.send(request, &fresh).await
    }

    async fn send(&self, request: &RequestDescriptor, token: &str) -> Result<Response, ApiError> {
        let bearer = bearer_value(token)?;
        let mut builder = self
            .client
            .request(request.method().clone(), request.url())
            .headers(request.merged_headers(bearer));
        if let Some(body) = request.body_bytes() {
            builder = builder.body(body.to_vec());
        }

        builder.send().await.map_err(|e| {
            warn!(url = request.url(), error = %e, "Request failed");
            ApiError::Network(e)
        })
    }

    /// Parse the 401 body; anything unreadable counts as an empty object
    async fn read_auth_failure(response: Response) -> Value {
        response
            .text()
            .await
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_else(|| Value::Object(Default::default()))
    }

    /// Exchange `expired` for a new token, at most once per caller.
    ///
    /// Concurrent callers queue on the refresh gate. Whoever gets it first
    /// does the refresh; the others see a different token in the store
    /// and reuse it, or see an empty store and give up.
    async fn refresh_once(&self, expired: &str) -> Result<String, ApiError> {
        let _gate = self.refresh_gate.lock().await;

        match self.current_token()? {
            Some(current) if current != expired => {
                debug!("Token already refreshed by a concurrent request");
                return Ok(current);
            }
            None => {
                debug!("Session was cleared while waiting to refresh");
                return Err(ApiError::SessionExpired);
            }
            Some(_) => {}
        }

        let token = match self.request_new_token(expired).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                self.force_logout();
                return Err(ApiError::SessionExpired);
            }
        };

        if let Err(e) = self.store.set(&token) {
            self.force_logout();
            return Err(ApiError::Store(e));
        }
        self.state.send_replace(Some(token.clone()));
        info!("Token refreshed");
        Ok(token)
    }

    async fn request_new_token(&self, expired: &str) -> anyhow::Result<String> {
        let response = self
            .client
            .post(&self.refresh_url)
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(expired)
            .send()
            .await
            .context("Failed to send refresh request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Refresh rejected with status {}: {}",
                status,
                ApiError::truncate_body(&body)
            ));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .context("Failed to parse refresh response")?;
        Ok(refreshed.access_token)
    }

    /// Clear the stored token after an authorization failure
    fn force_logout(&self) {
        if let Err(e) = self.store.clear() {
            error!(error = %e, "Failed to clear stored token");
        }
        self.state.send_replace(None);
    }
}

fn bearer_value(token: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| ApiError::Validation("Stored token is not a valid header value".to_string()))
}

/// True when a 401 body reports an expired token: a truthy `expired`
/// field, or `msg` equal to "Token has expired".
pub fn is_expiry_signal(body: &Value) -> bool {
    let expired_flag = body.get("expired").map(is_truthy).unwrap_or(false);
    let expired_msg = body.get("msg").and_then(Value::as_str) == Some(EXPIRED_TOKEN_MESSAGE);
    expired_flag || expired_msg
}

/// JavaScript truthiness of a JSON value
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
