use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Remote endpoints, used to tag failures with where they came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Register,
    Login,
    Me,
    GenerateImage,
    ImageStyles,
    ImageStatus,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Register => "/auth/register",
            Endpoint::Login => "/auth/login",
            Endpoint::Me => "/auth/me",
            Endpoint::GenerateImage => "/images/generate",
            Endpoint::ImageStyles => "/images/styles",
            Endpoint::ImageStatus => "/images/status",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{detail}")]
    Validation { endpoint: Endpoint, detail: String },

    #[error("{0}")]
    Auth(String),

    #[error("Unauthorized - session expired, please log in again")]
    Unauthorized,

    #[error("{detail}")]
    Server {
        endpoint: Endpoint,
        status: u16,
        detail: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error body shape: `{"detail": "..."}` or the validation form
/// `{"detail": [{"msg": "...", "loc": [...]}, ...]}`.
#[derive(Deserialize)]
struct ErrorBody {
    detail: Detail,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Detail {
    Message(String),
    Items(Vec<DetailItem>),
}

#[derive(Deserialize)]
struct DetailItem {
    msg: String,
}

impl ApiError {
    pub fn validation(endpoint: Endpoint, detail: impl Into<String>) -> Self {
        ApiError::Validation {
            endpoint,
            detail: detail.into(),
        }
    }

    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Extract the human-readable message from an error body.
    pub fn detail_from_body(status: StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            match parsed.detail {
                Detail::Message(msg) => return msg,
                Detail::Items(items) if !items.is_empty() => {
                    return items
                        .into_iter()
                        .map(|item| item.msg)
                        .collect::<Vec<_>>()
                        .join("; ");
                }
                Detail::Items(_) => {}
            }
        }

        let trimmed = body.trim();
        if trimmed.is_empty() {
            format!("Server returned {}", status)
        } else {
            Self::truncate_body(trimmed)
        }
    }

    /// Map a non-success response to the error variant for its endpoint.
    pub fn from_response(endpoint: Endpoint, status: StatusCode, body: &str) -> Self {
        let detail = Self::detail_from_body(status, body);
        match (endpoint, status.as_u16()) {
            (Endpoint::Login, 400 | 401 | 403) => ApiError::Auth(detail),
            (_, 401) => ApiError::Unauthorized,
            (Endpoint::Register | Endpoint::GenerateImage, 400..=499) => {
                ApiError::Validation { endpoint, detail }
            }
            (_, code) => ApiError::Server {
                endpoint,
                status: code,
                detail,
            },
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}
