//! Remote authentication operations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{ApiClient, ApiError};
use crate::models::{AccessToken, Profile};

/// The three remote calls the session store depends on.
///
/// Each call is one-shot: no retries, no de-duplication of overlapping calls.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Create an account. Server-side rejections surface as `ApiError::Validation`.
    async fn register(&self, username: &str, password: &str) -> Result<Profile, ApiError>;

    /// Exchange credentials for a token. Bad credentials surface as `ApiError::Auth`.
    async fn login(&self, username: &str, password: &str) -> Result<AccessToken, ApiError>;

    /// Resolve a token to its profile. A rejected token surfaces as
    /// `ApiError::Unauthorized`; the caller must then drop the token.
    async fn fetch_profile(&self, token: &AccessToken) -> Result<Profile, ApiError>;
}

#[async_trait]
impl AuthGateway for ApiClient {
    async fn register(&self, username: &str, password: &str) -> Result<Profile, ApiError> {
        ApiClient::register(self, username, password).await
    }

    async fn login(&self, username: &str, password: &str) -> Result<AccessToken, ApiError> {
        ApiClient::login(self, username, password).await
    }

    async fn fetch_profile(&self, token: &AccessToken) -> Result<Profile, ApiError> {
        ApiClient::fetch_profile(self, token).await
    }
}

/// Blanket implementation for `Arc<G>` where `G: AuthGateway`.
#[async_trait]
impl<G: AuthGateway + ?Sized> AuthGateway for Arc<G> {
    async fn register(&self, username: &str, password: &str) -> Result<Profile, ApiError> {
        (**self).register(username, password).await
    }

    async fn login(&self, username: &str, password: &str) -> Result<AccessToken, ApiError> {
        (**self).login(username, password).await
    }

    async fn fetch_profile(&self, token: &AccessToken) -> Result<Profile, ApiError> {
        (**self).fetch_profile(token).await
    }
}
