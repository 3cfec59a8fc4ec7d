//! REST API client module for the quiz service.
//!
//! `AuthenticatedClient` wraps every protected request with a bearer
//! token and performs at most one silent refresh when the server reports
//! the token as expired. `QuizClient` builds the typed endpoint calls on
//! top of it.

pub mod authed;
pub mod client;
pub mod error;
pub mod request;

pub use authed::AuthenticatedClient;
pub use client::QuizClient;
pub use error::ApiError;
pub use request::RequestDescriptor;
