//! jobscout core library.
//!
//! Client-side plumbing for the jobscout job-search and image-generation
//! service: the HTTP API client, the authentication gateway, persisted
//! session slots and the session store that front ends drive.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod session;
pub mod utils;

pub use api::{ApiClient, ApiError, Endpoint};
pub use auth::{AuthGateway, FileStorage, KeyringStorage, MemoryStorage, SessionStorage, StorageError};
pub use config::{Config, TokenBackend};
pub use models::{AccessToken, Profile};
pub use session::{SessionError, SessionState, SessionStore};
