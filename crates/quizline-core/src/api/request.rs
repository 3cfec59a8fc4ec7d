//! Description of a single outgoing request.

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;

/// Target, method, body and caller headers of one request.
///
/// The body is kept as bytes so the same descriptor can be re-sent after a
/// token refresh.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    url: String,
    method: Method,
    body: Option<Vec<u8>>,
    headers: HeaderMap,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    /// Serialize `body` as the JSON request body
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> serde_json::Result<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Add a caller header. Caller headers win over the client defaults.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Merge request headers in last-write-wins order: content type, then
    /// the bearer header, then every caller header.
    pub(crate) fn merged_headers(&self, bearer: HeaderValue) -> HeaderMap {
        let mut merged = HeaderMap::new();
        merged.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        merged.insert(header::AUTHORIZATION, bearer);

        for name in self.headers.keys() {
            merged.remove(name);
        }
        for (name, value) in self.headers.iter() {
            merged.append(name, value.clone());
        }
        merged
    }
}
