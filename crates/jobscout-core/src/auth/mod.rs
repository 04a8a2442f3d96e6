//! Authentication module: the remote gateway and the persisted session slots.
//!
//! This module provides:
//! - `AuthGateway`: register / login / fetch-profile against the service
//! - `SessionStorage`: the durable token slot and the short-lived profile cache
//! - Client-side credential pre-checks

pub mod gateway;
pub mod storage;
pub mod validation;

pub use gateway::AuthGateway;
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage, StorageError};
