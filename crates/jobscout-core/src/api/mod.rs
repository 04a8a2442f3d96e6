//! REST API client module for the jobscout service.
//!
//! This module provides the `ApiClient` for communicating with the
//! jobscout HTTP API: account registration, login, the current-user
//! profile and the image-generation endpoints.
//!
//! Authenticated endpoints take a bearer token issued by `/auth/login`.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::{ApiError, Endpoint};
