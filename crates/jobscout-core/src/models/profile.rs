use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Server-authoritative user record returned by `/auth/register` and `/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub username: String,
    pub created_at: String,
}

impl Profile {
    pub fn new(id: impl Into<String>, username: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            created_at: created_at.into(),
        }
    }
}

/// Some deployments return numeric ids, others strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Int(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Int(n) => n.to_string(),
    })
}

/// Opaque bearer credential issued at login.
///
/// `Debug` is redacted so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Body of a successful `/auth/login` response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: AccessToken,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Request body shared by `/auth/register` and `/auth/login`.
#[derive(Serialize)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parses_string_id() {
        let json = r#"{"id":"1","username":"bob","created_at":"2024-01-01"}"#;
        let profile: Profile = serde_json::from_str(json).expect("profile should parse");
        assert_eq!(profile, Profile::new("1", "bob", "2024-01-01"));
    }

    #[test]
    fn test_profile_parses_numeric_id() {
        let json = r#"{"id":42,"username":"alice","created_at":"2024-03-05T10:00:00Z"}"#;
        let profile: Profile = serde_json::from_str(json).expect("profile should parse");
        assert_eq!(profile.id, "42");
        assert_eq!(profile.username, "alice");
    }

    #[test]
    fn test_token_response_defaults_token_type() {
        let resp: TokenResponse = serde_json::from_str(r#"{"access_token":"tok123"}"#)
            .expect("token response should parse");
        assert_eq!(resp.access_token.as_str(), "tok123");
        assert_eq!(resp.token_type, "bearer");
    }

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("super-secret");
        assert!(!format!("{:?}", token).contains("super-secret"));
    }
}
