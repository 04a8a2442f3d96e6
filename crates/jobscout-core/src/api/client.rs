//! API client for communicating with the jobscout REST API.
//!
//! This module provides the `ApiClient` struct for registering accounts,
//! logging in, fetching the current profile and calling the image
//! generation endpoints.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::validation::{validate_login, validate_registration};
use crate::models::{
    AccessToken, Credentials, GenerateImageRequest, GeneratedImage, ImageServiceStatus,
    ImageStyles, Profile, TokenResponse,
};

use super::{ApiError, Endpoint};

// ============================================================================
// Constants
// ============================================================================

/// Base URL used when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// API client for the jobscout service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client for the given base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create with a custom reqwest [`Client`], sharing its connection pool.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    /// Check if response is successful, mapping the error body otherwise.
    async fn check_response(endpoint: Endpoint, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(endpoint = %endpoint, status = status.as_u16(), "Request rejected");
        Err(ApiError::from_response(endpoint, status, &body))
    }

    async fn send<T: DeserializeOwned>(&self, endpoint: Endpoint, request: RequestBuilder) -> Result<T, ApiError> {
        debug!(endpoint = %endpoint, "Sending request");
        let response = request.send().await?;
        let response = Self::check_response(endpoint, response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", endpoint, e)))
    }

    // ===== Authentication =====

    /// Create a new account. Usernames shorter than 3 characters and
    /// passwords shorter than 6 are rejected before anything is sent.
    pub async fn register(&self, username: &str, password: &str) -> Result<Profile, ApiError> {
        validate_registration(username, password)?;
        let request = self
            .client
            .post(self.url(Endpoint::Register))
            .json(&Credentials { username, password });
        let profile: Profile = self.send(Endpoint::Register, request).await?;
        debug!(user_id = %profile.id, "Account registered");
        Ok(profile)
    }

    /// Exchange credentials for a bearer token
    pub async fn login(&self, username: &str, password: &str) -> Result<AccessToken, ApiError> {
        validate_login(username, password)?;
        let request = self
            .client
            .post(self.url(Endpoint::Login))
            .json(&Credentials { username, password });
        let response: TokenResponse = self.send(Endpoint::Login, request).await?;
        if !response.token_type.eq_ignore_ascii_case("bearer") {
            warn!(token_type = %response.token_type, "Unexpected token type");
        }
        Ok(response.access_token)
    }

    /// Fetch the profile that owns `token`
    pub async fn fetch_profile(&self, token: &AccessToken) -> Result<Profile, ApiError> {
        let request = self
            .client
            .get(self.url(Endpoint::Me))
            .bearer_auth(token.as_str());
        self.send(Endpoint::Me, request).await
    }

    // ===== Images =====

    pub async fn generate_image(
        &self,
        token: &AccessToken,
        request: &GenerateImageRequest,
    ) -> Result<GeneratedImage, ApiError> {
        if request.prompt.trim().is_empty() {
            return Err(ApiError::validation(Endpoint::GenerateImage, "Prompt must not be empty"));
        }
        let builder = self
            .client
            .post(self.url(Endpoint::GenerateImage))
            .bearer_auth(token.as_str())
            .json(request);
        self.send(Endpoint::GenerateImage, builder).await
    }

    pub async fn image_styles(&self, token: &AccessToken) -> Result<ImageStyles, ApiError> {
        let builder = self
            .client
            .get(self.url(Endpoint::ImageStyles))
            .bearer_auth(token.as_str());
        self.send(Endpoint::ImageStyles, builder).await
    }

    pub async fn image_status(&self, token: &AccessToken) -> Result<ImageServiceStatus, ApiError> {
        let builder = self
            .client
            .get(self.url(Endpoint::ImageStatus))
            .bearer_auth(token.as_str());
        self.send(Endpoint::ImageStatus, builder).await
    }
}
