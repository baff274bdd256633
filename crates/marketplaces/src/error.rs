use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketplaceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },
    #[error("rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl MarketplaceError {
    /// Whether repeating the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Self::RateLimited { .. } | Self::Server { .. } => true,
            _ => false,
        }
    }

    /// Whether the request provably never reached the platform, so even a
    /// non-idempotent call can be sent again without creating a duplicate.
    pub fn is_unsent(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect(),
            Self::RateLimited { .. } => true,
            _ => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status, .. }
            | Self::Rejected { status, .. }
            | Self::Server { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::NotFound(_) => Some(404),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// OAuth token endpoints answer `400 invalid_grant` when a refresh token is revoked or expired.
    pub fn is_invalid_grant(&self) -> bool {
        match self {
            Self::Rejected { message, .. } | Self::Unauthorized { message, .. } => {
                message.contains("invalid_grant") || message.contains("invalid_token")
            }
            _ => false,
        }
    }
}
