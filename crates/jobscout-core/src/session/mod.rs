//! Client-side session lifecycle.
//!
//! `SessionStore` is an explicit object owned by whatever front end drives
//! it. Its state moves from `Unknown` to `Authenticated` or `Anonymous` and
//! every transition is published over a watch channel.

pub mod store;

pub use store::{SessionError, SessionState, SessionStore};
