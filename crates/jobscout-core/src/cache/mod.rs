//! Local caching module.
//!
//! This module provides the `CacheManager` for storing short-lived JSON
//! snapshots on disk. The only cached entity today is the signed-in
//! user's profile, kept so a front end can paint something before the
//! authoritative `/auth/me` call resolves.

pub mod manager;

pub use manager::{CacheManager, CachedData};
