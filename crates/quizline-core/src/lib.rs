//! Core library for quizline.
//!
//! This crate contains everything that is independent of the terminal
//! front end:
//!
//! - `api`: the authenticated request client and typed endpoint bindings
//! - `auth`: token stores (memory, session file, OS keychain)
//! - `models`: questions, submissions, history and progress types
//! - `quiz`: client-side quiz run and level editing state
//! - `cache`: offline JSON cache
//! - `config`: persisted configuration

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod quiz;
pub mod utils;

pub use api::{ApiError, AuthenticatedClient, QuizClient, RequestDescriptor};
pub use auth::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
pub use config::{Config, TokenBackend};
