//! Integration tests for bearer requests with transparent token refresh

use std::sync::Arc;

use mockito::{Matcher, Server};
use quizline_core::auth::{MemoryTokenStore, TokenStore};
use quizline_core::{ApiError, AuthenticatedClient, RequestDescriptor};
use reqwest::header::{HeaderName, HeaderValue};
use serde_json::json;

fn client_for(server: &Server, store: Arc<MemoryTokenStore>) -> AuthenticatedClient {
    AuthenticatedClient::new(store, format!("{}/refresh-token", server.url()))
        .expect("Failed to build client")
}

fn expired_body() -> String {
    json!({ "msg": "Token has expired", "expired": true }).to_string()
}

#[tokio::test]
async fn call_without_token_fails_before_any_request() {
    //* Given
    let mut server = Server::new_async().await;
    let api_mock = server
        .mock("GET", "/api/questions")
        .expect(0)
        .create_async()
        .await;
    let store = Arc::new(MemoryTokenStore::new());
    let client = client_for(&server, store);

    //* When
    let result = client
        .call(&RequestDescriptor::get(format!("{}/api/questions", server.url())))
        .await;

    //* Then
    assert!(matches!(result, Err(ApiError::NoCredential)));
    api_mock.assert_async().await;
}

#[tokio::test]
async fn non_401_responses_pass_through_unchanged() {
    //* Given
    let mut server = Server::new_async().await;
    let ok_mock = server
        .mock("GET", "/ok")
        .match_header("authorization", "Bearer T1")
        .match_header("content-type", "application/json")
        .with_status(200)
        .with_body(r#"{"expired": true}"#)
        .create_async()
        .await;
    let not_found_mock = server
        .mock("GET", "/missing")
        .with_status(404)
        .with_body("nope")
        .create_async()
        .await;
    let error_mock = server
        .mock("POST", "/broken")
        .with_status(500)
        .with_body(r#"{"error": "Failed to submit quiz"}"#)
        .create_async()
        .await;
    let refresh_mock = server
        .mock("POST", "/refresh-token")
        .expect(0)
        .create_async()
        .await;
    let store = Arc::new(MemoryTokenStore::with_token("T1"));
    let client = client_for(&server, store.clone());

    //* When
    let ok = client
        .call(&RequestDescriptor::get(format!("{}/ok", server.url())))
        .await
        .expect("200 should be returned");
    let missing = client
        .call(&RequestDescriptor::get(format!("{}/missing", server.url())))
        .await
        .expect("404 should be returned");
    let broken = client
        .call(&RequestDescriptor::post(format!("{}/broken", server.url())))
        .await
        .expect("500 should be returned");

    //* Then
    assert_eq!(ok.status(), 200);
    assert_eq!(ok.text().await.unwrap(), r#"{"expired": true}"#);
    assert_eq!(missing.status(), 404);
    assert_eq!(missing.text().await.unwrap(), "nope");
    assert_eq!(broken.status(), 500);
    assert_eq!(store.get().unwrap().as_deref(), Some("T1"));
    ok_mock.assert_async().await;
    not_found_mock.assert_async().await;
    error_mock.assert_async().await;
    refresh_mock.assert_async().await;
}

#[tokio::test]
async fn expired_token_is_refreshed_and_request_retried() {
    //* Given
    let mut server = Server::new_async().await;
    let body = json!({ "answers": { "1": "Paris" } });

    let expired_mock = server
        .mock("POST", "/api/submit")
        .match_header("authorization", "Bearer T1")
        .match_body(Matcher::Json(body.clone()))
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(expired_body())
        .expect(1)
        .create_async()
        .await;
    let refresh_mock = server
        .mock("POST", "/refresh-token")
        .match_header("authorization", "Bearer T1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "T2", "expires_in": 86400}"#)
        .expect(1)
        .create_async()
        .await;
    let retry_mock = server
        .mock("POST", "/api/submit")
        .match_header("authorization", "Bearer T2")
        .match_body(Matcher::Json(body.clone()))
        .with_status(200)
        .with_body(r#"{"score": 1}"#)
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(MemoryTokenStore::with_token("T1"));
    let client = client_for(&server, store.clone());
    let updates = client.subscribe();

    //* When
    let request = RequestDescriptor::post(format!("{}/api/submit", server.url()))
        .json(&body)
        .unwrap();
    let response = client.call(&request).await.expect("retry should succeed");

    //* Then
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), r#"{"score": 1}"#);
    assert_eq!(store.get().unwrap().as_deref(), Some("T2"));
    assert_eq!(updates.borrow().as_deref(), Some("T2"));
    expired_mock.assert_async().await;
    refresh_mock.assert_async().await;
    retry_mock.assert_async().await;
}

#[tokio::test]
async fn expiry_message_alone_triggers_refresh() {
    //* Given
    let mut server = Server::new_async().await;
    let _expired = server
        .mock("GET", "/api/quiz-history")
        .match_header("authorization", "Bearer T1")
        .with_status(401)
        .with_body(r#"{"msg": "Token has expired"}"#)
        .create_async()
        .await;
    let refresh_mock = server
        .mock("POST", "/refresh-token")
        .with_status(200)
        .with_body(r#"{"access_token": "T2"}"#)
        .expect(1)
        .create_async()
        .await;
    let _retry = server
        .mock("GET", "/api/quiz-history")
        .match_header("authorization", "Bearer T2")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    let store = Arc::new(MemoryTokenStore::with_token("T1"));
    let client = client_for(&server, store.clone());

    //* When
    let response = client
        .call(&RequestDescriptor::get(format!("{}/api/quiz-history", server.url())))
        .await
        .unwrap();

    //* Then
    assert_eq!(response.status(), 200);
    assert_eq!(store.get().unwrap().as_deref(), Some("T2"));
    refresh_mock.assert_async().await;
}

#[tokio::test]
async fn retry_response_is_returned_even_when_unauthorized() {
    //* Given
    let mut server = Server::new_async().await;
    let _expired = server
        .mock("GET", "/api/questions")
        .match_header("authorization", "Bearer T1")
        .with_status(401)
        .with_body(expired_body())
        .create_async()
        .await;
    let refresh_mock = server
        .mock("POST", "/refresh-token")
        .with_status(200)
        .with_body(r#"{"access_token": "T2"}"#)
        .expect(1)
        .create_async()
        .await;
    let retry_mock = server
        .mock("GET", "/api/questions")
        .match_header("authorization", "Bearer T2")
        .with_status(401)
        .with_body(expired_body())
        .expect(1)
        .create_async()
        .await;
    let store = Arc::new(MemoryTokenStore::with_token("T1"));
    let client = client_for(&server, store.clone());

    //* When
    let response = client
        .call(&RequestDescriptor::get(format!("{}/api/questions", server.url())))
        .await
        .expect("retry response should be returned verbatim");

    //* Then
    assert_eq!(response.status(), 401);
    assert_eq!(store.get().unwrap().as_deref(), Some("T2"));
    refresh_mock.assert_async().await;
    retry_mock.assert_async().await;
}

#[tokio::test]
async fn failed_refresh_clears_token_and_reports_session_expired() {
    //* Given
    let mut server = Server::new_async().await;
    let _expired = server
        .mock("GET", "/api/questions")
        .with_status(401)
        .with_body(expired_body())
        .create_async()
        .await;
    let refresh_mock = server
        .mock("POST", "/refresh-token")
        .with_status(401)
        .with_body(r#"{"msg": "Invalid token", "invalid": true}"#)
        .expect(1)
        .create_async()
        .await;
    let store = Arc::new(MemoryTokenStore::with_token("T1"));
    let client = client_for(&server, store.clone());
    let updates = client.subscribe();

    //* When
    let result = client
        .call(&RequestDescriptor::get(format!("{}/api/questions", server.url())))
        .await;

    //* Then
    assert!(matches!(result, Err(ApiError::SessionExpired)));
    assert_eq!(store.get().unwrap(), None);
    assert_eq!(*updates.borrow(), None);
    refresh_mock.assert_async().await;
}

#[tokio::test]
async fn refresh_without_token_in_body_is_session_expired() {
    //* Given
    let mut server = Server::new_async().await;
    let _expired = server
        .mock("GET", "/api/questions")
        .with_status(401)
        .with_body(expired_body())
        .create_async()
        .await;
    let refresh_mock = server
        .mock("POST", "/refresh-token")
        .with_status(200)
        .with_body("not json")
        .expect(1)
        .create_async()
        .await;
    let store = Arc::new(MemoryTokenStore::with_token("T1"));
    let client = client_for(&server, store.clone());

    //* When
    let result = client
        .call(&RequestDescriptor::get(format!("{}/api/questions", server.url())))
        .await;

    //* Then
    assert!(matches!(result, Err(ApiError::SessionExpired)));
    assert_eq!(store.get().unwrap(), None);
    refresh_mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_refresh_endpoint_is_session_expired() {
    //* Given
    let mut server = Server::new_async().await;
    let _expired = server
        .mock("GET", "/api/questions")
        .with_status(401)
        .with_body(expired_body())
        .create_async()
        .await;
    let store = Arc::new(MemoryTokenStore::with_token("T1"));
    let client = AuthenticatedClient::new(
        store.clone(),
        format!("http://127.0.0.1:{}/refresh-token", closed_port()),
    )
    .unwrap();

    //* When
    let result = client
        .call(&RequestDescriptor::get(format!("{}/api/questions", server.url())))
        .await;

    //* Then
    assert!(matches!(result, Err(ApiError::SessionExpired)));
    assert_eq!(store.get().unwrap(), None);
}

#[tokio::test]
async fn invalid_token_logs_out_without_refreshing() {
    //* Given
    let mut server = Server::new_async().await;
    let invalid_mock = server
        .mock("GET", "/api/questions")
        .with_status(401)
        .with_body(r#"{"msg": "Invalid token", "invalid": true}"#)
        .expect(1)
        .create_async()
        .await;
    let refresh_mock = server
        .mock("POST", "/refresh-token")
        .expect(0)
        .create_async()
        .await;
    let store = Arc::new(MemoryTokenStore::with_token("T1"));
    let client = client_for(&server, store.clone());

    //* When
    let result = client
        .call(&RequestDescriptor::get(format!("{}/api/questions", server.url())))
        .await;

    //* Then
    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert_eq!(store.get().unwrap(), None);
    invalid_mock.assert_async().await;
    refresh_mock.assert_async().await;
}

#[tokio::test]
async fn unparseable_401_body_is_treated_as_invalid_token() {
    //* Given
    let mut server = Server::new_async().await;
    let _unauthorized = server
        .mock("GET", "/api/questions")
        .with_status(401)
        .with_body("<html>401</html>")
        .create_async()
        .await;
    let refresh_mock = server
        .mock("POST", "/refresh-token")
        .expect(0)
        .create_async()
        .await;
    let store = Arc::new(MemoryTokenStore::with_token("T1"));
    let client = client_for(&server, store.clone());

    //* When
    let result = client
        .call(&RequestDescriptor::get(format!("{}/api/questions", server.url())))
        .await;

    //* Then
    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert_eq!(store.get().unwrap(), None);
    refresh_mock.assert_async().await;
}

#[tokio::test]
async fn transport_failure_is_network_error_and_keeps_token() {
    //* Given
    let store = Arc::new(MemoryTokenStore::with_token("T1"));
    let port = closed_port();
    let client = AuthenticatedClient::new(
        store.clone(),
        format!("http://127.0.0.1:{}/refresh-token", port),
    )
    .unwrap();

    //* When
    let result = client
        .call(&RequestDescriptor::get(format!("http://127.0.0.1:{}/api/questions", port)))
        .await;

    //* Then
    let err = result.expect_err("connection should be refused");
    assert!(err.is_network());
    assert_eq!(err.to_string(), "Network error - please check your connection");
    assert_eq!(store.get().unwrap().as_deref(), Some("T1"));
}

#[tokio::test]
async fn repeated_calls_with_valid_token_are_independent() {
    //* Given
    let mut server = Server::new_async().await;
    let ok_mock = server
        .mock("GET", "/api/questions")
        .match_header("authorization", "Bearer T1")
        .with_status(200)
        .with_body(r#"{"questions": []}"#)
        .expect(2)
        .create_async()
        .await;
    let store = Arc::new(MemoryTokenStore::with_token("T1"));
    let client = client_for(&server, store.clone());
    let request = RequestDescriptor::get(format!("{}/api/questions", server.url()));

    //* When
    let first = client.call(&request).await.unwrap();
    let second = client.call(&request).await.unwrap();

    //* Then
    assert_eq!(first.status(), 200);
    assert_eq!(second.status(), 200);
    assert_eq!(store.get().unwrap().as_deref(), Some("T1"));
    ok_mock.assert_async().await;
}

#[tokio::test]
async fn caller_headers_are_sent_and_override_defaults() {
    //* Given
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/upload")
        .match_header("authorization", "Bearer T1")
        .match_header("content-type", "text/plain")
        .match_header("x-client", "quizline")
        .with_status(204)
        .expect(1)
        .create_async()
        .await;
    let store = Arc::new(MemoryTokenStore::with_token("T1"));
    let client = client_for(&server, store);

    //* When
    let request = RequestDescriptor::post(format!("{}/api/upload", server.url()))
        .header(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain"),
        )
        .header(
            HeaderName::from_static("x-client"),
            HeaderValue::from_static("quizline"),
        )
        .body("hello");
    let response = client.call(&request).await.unwrap();

    //* Then
    assert_eq!(response.status(), 204);
    mock.assert_async().await;
}

#[tokio::test]
async fn concurrent_expiries_share_a_single_refresh() {
    //* Given
    let mut server = Server::new_async().await;
    let expired_mock = server
        .mock("GET", "/api/questions")
        .match_header("authorization", "Bearer T1")
        .with_status(401)
        .with_body(expired_body())
        .expect_at_least(1)
        .create_async()
        .await;
    let refresh_mock = server
        .mock("POST", "/refresh-token")
        .with_status(200)
        .with_body(r#"{"access_token": "T2"}"#)
        .expect(1)
        .create_async()
        .await;
    let retry_mock = server
        .mock("GET", "/api/questions")
        .match_header("authorization", "Bearer T2")
        .with_status(200)
        .with_body(r#"{"questions": []}"#)
        .expect(2)
        .create_async()
        .await;
    let store = Arc::new(MemoryTokenStore::with_token("T1"));
    let client = client_for(&server, store.clone());
    let other = client.clone();
    let request = RequestDescriptor::get(format!("{}/api/questions", server.url()));

    //* When
    let (first, second) = tokio::join!(client.call(&request), other.call(&request));

    //* Then
    assert_eq!(first.unwrap().status(), 200);
    assert_eq!(second.unwrap().status(), 200);
    assert_eq!(store.get().unwrap().as_deref(), Some("T2"));
    expired_mock.assert_async().await;
    refresh_mock.assert_async().await;
    retry_mock.assert_async().await;
}

#[tokio::test]
async fn login_and_logout_update_store_and_subscribers() {
    //* Given
    let server = Server::new_async().await;
    let store = Arc::new(MemoryTokenStore::new());
    let client = client_for(&server, store.clone());
    let mut updates = client.subscribe();
    assert_eq!(*updates.borrow_and_update(), None);

    //* When
    client.login("T9").unwrap();

    //* Then
    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().as_deref(), Some("T9"));
    assert_eq!(client.current_token().unwrap().as_deref(), Some("T9"));

    client.logout().unwrap();
    assert_eq!(*updates.borrow_and_update(), None);
    assert_eq!(store.get().unwrap(), None);
}

#[tokio::test]
async fn concurrent_expiries_share_a_failed_refresh() {
    //* Given
    let mut server = Server::new_async().await;
    let expired_mock = server
        .mock("GET", "/api/questions")
        .match_header("authorization", "Bearer T1")
        .with_status(401)
        .with_body(expired_body())
        .expect(2)
        .create_async()
        .await;
    let refresh_mock = server
        .mock("POST", "/refresh-token")
        .with_status(500)
        .with_body(r#"{"error": "Token refresh failed"}"#)
        .expect(1)
        .create_async()
        .await;
    let store = Arc::new(MemoryTokenStore::with_token("T1"));
    let client = client_for(&server, store.clone());
    let other = client.clone();
    let request = RequestDescriptor::get(format!("{}/api/questions", server.url()));

    //* When
    let (first, second) = tokio::join!(client.call(&request), other.call(&request));

    //* Then
    assert!(matches!(first, Err(ApiError::SessionExpired)));
    assert!(matches!(second, Err(ApiError::SessionExpired)));
    assert_eq!(store.get().unwrap(), None);
    expired_mock.assert_async().await;
    refresh_mock.assert_async().await;
}

/// Token store whose writes always fail
struct ReadOnlyStore {
    inner: MemoryTokenStore,
}

impl TokenStore for ReadOnlyStore {
    fn get(&self) -> anyhow::Result<Option<String>> {
        self.inner.get()
    }

    fn set(&self, _token: &str) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("disk full"))
    }

    fn clear(&self) -> anyhow::Result<()> {
        self.inner.clear()
    }
}

#[tokio::test]
async fn refreshed_token_that_cannot_be_stored_clears_session() {
    //* Given
    let mut server = Server::new_async().await;
    let _expired = server
        .mock("GET", "/api/questions")
        .match_header("authorization", "Bearer T1")
        .with_status(401)
        .with_body(expired_body())
        .create_async()
        .await;
    let refresh_mock = server
        .mock("POST", "/refresh-token")
        .with_status(200)
        .with_body(r#"{"access_token": "T2"}"#)
        .expect(1)
        .create_async()
        .await;
    let retry_mock = server
        .mock("GET", "/api/questions")
        .match_header("authorization", "Bearer T2")
        .expect(0)
        .create_async()
        .await;
    let store = Arc::new(ReadOnlyStore {
        inner: MemoryTokenStore::with_token("T1"),
    });
    let client = AuthenticatedClient::new(store.clone(), format!("{}/refresh-token", server.url()))
        .expect("Failed to build client");
    let updates = client.subscribe();

    //* When
    let result = client
        .call(&RequestDescriptor::get(format!("{}/api/questions", server.url())))
        .await;

    //* Then
    assert!(matches!(result, Err(ApiError::Store(_))));
    assert_eq!(store.get().unwrap(), None);
    assert_eq!(*updates.borrow(), None);
    refresh_mock.assert_async().await;
    retry_mock.assert_async().await;
}

#[tokio::test]
async fn transport_failure_on_retry_is_network_error_and_keeps_new_token() {
    //* Given
    let mut server = Server::new_async().await;
    let refresh_mock = server
        .mock("POST", "/refresh-token")
        .match_header("authorization", "Bearer T1")
        .with_status(200)
        .with_body(r#"{"access_token": "T2"}"#)
        .expect(1)
        .create_async()
        .await;
    let (api_url, api_server) = serve_one_expired_response();
    let store = Arc::new(MemoryTokenStore::with_token("T1"));
    let client = client_for(&server, store.clone());

    //* When
    let result = client.call(&RequestDescriptor::get(api_url)).await;

    //* Then
    assert!(matches!(result, Err(ApiError::Network(_))));
    assert_eq!(store.get().unwrap().as_deref(), Some("T2"));
    api_server.join().unwrap();
    refresh_mock.assert_async().await;
}

/// Answer the first request with an expiry 401, then stop listening so
/// the next connection is refused
fn serve_one_expired_response() -> (String, std::thread::JoinHandle<()>) {
    use std::io::{Read, Write};

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/api/questions", listener.local_addr().unwrap());
    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        drop(listener);

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let read = stream.read(&mut buf).unwrap();
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buf[..read]);
        }

        let body = expired_body();
        let response = format!(
            "HTTP/1.1 401 Unauthorized\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).unwrap();
    });
    (url, handle)
}

/// A local port with nothing listening on it
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
