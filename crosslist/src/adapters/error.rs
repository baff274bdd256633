//! Listing operation errors, normalized across marketplaces.

use std::time::Duration;

use marketplaces_api::MarketplaceError;
use serde::Serialize;
use thiserror::Error;

use crate::credentials::TokenError;
use crate::domain::Platform;

/// Stable, serializable classification of a [`ListingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ListingErrorKind {
    NotConnected,
    ReauthorizationRequired,
    ValidationRejected,
    RateLimited,
    TransientNetworkError,
    MissingPrerequisite,
    AlreadySold,
    NotFound,
    Unsupported,
    Internal,
}

impl ListingErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotConnected => "NotConnected",
            Self::ReauthorizationRequired => "ReauthorizationRequired",
            Self::ValidationRejected => "ValidationRejected",
            Self::RateLimited => "RateLimited",
            Self::TransientNetworkError => "TransientNetworkError",
            Self::MissingPrerequisite => "MissingPrerequisite",
            Self::AlreadySold => "AlreadySold",
            Self::NotFound => "NotFound",
            Self::Unsupported => "Unsupported",
            Self::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ListingErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("{} is not connected", .0.display_name())]
    NotConnected(Platform),

    #[error("{} requires re-authorization: {reason}", .platform.display_name())]
    ReauthorizationRequired { platform: Platform, reason: String },

    /// The platform refused the payload; retrying unchanged will not help.
    #[error("Rejected by platform: {0}")]
    ValidationRejected(String),

    #[error("Rate limited by platform")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Transient network error: {0}")]
    Transient(String),

    #[error("{0}")]
    MissingPrerequisite(String),

    #[error("Product has already been sold")]
    AlreadySold,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ListingError {
    pub fn kind(&self) -> ListingErrorKind {
        match self {
            Self::NotConnected(_) => ListingErrorKind::NotConnected,
            Self::ReauthorizationRequired { .. } => ListingErrorKind::ReauthorizationRequired,
            Self::ValidationRejected(_) => ListingErrorKind::ValidationRejected,
            Self::RateLimited { .. } => ListingErrorKind::RateLimited,
            Self::Transient(_) => ListingErrorKind::TransientNetworkError,
            Self::MissingPrerequisite(_) => ListingErrorKind::MissingPrerequisite,
            Self::AlreadySold => ListingErrorKind::AlreadySold,
            Self::NotFound(_) => ListingErrorKind::NotFound,
            Self::Unsupported(_) => ListingErrorKind::Unsupported,
            Self::Internal(_) => ListingErrorKind::Internal,
        }
    }

    /// Whether the next sync cycle or a later request may succeed unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }

    pub fn requires_reauthorization(&self) -> bool {
        matches!(self, Self::ReauthorizationRequired { .. })
    }

    /// Maps a marketplace API failure during an operation on `platform`.
    pub fn from_marketplace(platform: Platform, err: MarketplaceError) -> Self {
        match err {
            MarketplaceError::RateLimited { retry_after } => Self::RateLimited { retry_after },
            MarketplaceError::NotFound(message) => Self::NotFound(message),
            MarketplaceError::Unauthorized { message, .. } => Self::ReauthorizationRequired {
                platform,
                reason: message,
            },
            MarketplaceError::Rejected { status, message } => {
                Self::ValidationRejected(format!("{status}: {message}"))
            }
            e => Self::Transient(e.to_string()),
        }
    }
}

impl From<TokenError> for ListingError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::NotConnected(platform) => Self::NotConnected(platform),
            TokenError::ReauthorizationRequired { platform, reason } => {
                Self::ReauthorizationRequired { platform, reason }
            }
            TokenError::CredentialsRejected(platform) => Self::ReauthorizationRequired {
                platform,
                reason: "stored credentials were rejected".to_string(),
            },
            TokenError::RateLimited { retry_after } => Self::RateLimited { retry_after },
            TokenError::Transient(message) => Self::Transient(message),
            e @ (TokenError::UnsupportedPlatform(_) | TokenError::Unsupported(_)) => {
                Self::Unsupported(e.to_string())
            }
            e @ (TokenError::InvalidState | TokenError::Storage(_)) => Self::Internal(e.to_string()),
        }
    }
}

impl From<crate::Error> for ListingError {
    fn from(err: crate::Error) -> Self {
        match err {
            crate::Error::NotFound { entity_type, id } => {
                Self::NotFound(format!("{entity_type} {id}"))
            }
            e => Self::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marketplace_mapping() {
        let rejected = MarketplaceError::Rejected {
            status: 400,
            message: "price must be positive".into(),
        };
        let err = ListingError::from_marketplace(Platform::Etsy, rejected);
        assert_eq!(err.kind(), ListingErrorKind::ValidationRejected);
        assert!(!err.is_retryable());

        let outage = MarketplaceError::Server {
            status: 502,
            message: String::new(),
        };
        let err = ListingError::from_marketplace(Platform::Ebay, outage);
        assert_eq!(err.kind(), ListingErrorKind::TransientNetworkError);
        assert!(err.is_retryable());

        let revoked = MarketplaceError::Unauthorized {
            status: 401,
            message: "token revoked".into(),
        };
        assert!(ListingError::from_marketplace(Platform::Ebay, revoked).requires_reauthorization());
    }

    #[test]
    fn test_token_mapping() {
        let err = ListingError::from(TokenError::NotConnected(Platform::Etsy));
        assert_eq!(err.kind(), ListingErrorKind::NotConnected);
        assert_eq!(err.to_string(), "Etsy is not connected");

        let err = ListingError::from(TokenError::Transient("timeout".into()));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_kind_serializes_as_name() {
        assert_eq!(
            serde_json::to_value(ListingErrorKind::ValidationRejected).unwrap(),
            "ValidationRejected"
        );
    }
}
