//! Token lifecycle error types.

use std::time::Duration;

use marketplaces_api::MarketplaceError;
use thiserror::Error;

use crate::domain::Platform;

#[derive(Debug, Error)]
pub enum TokenError {
    /// No connection row exists for the platform.
    #[error("{} is not connected", .0.display_name())]
    NotConnected(Platform),

    /// The stored grant is unusable; an operator has to link the account again.
    #[error("{} requires re-authorization: {reason}", .platform.display_name())]
    ReauthorizationRequired { platform: Platform, reason: String },

    #[error("Rate limited by token endpoint")]
    RateLimited { retry_after: Option<Duration> },

    /// Refresh failed for a reason that may clear up on its own.
    #[error("Transient token error: {0}")]
    Transient(String),

    #[error("No token provider registered for {0}")]
    UnsupportedPlatform(Platform),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Unknown or expired authorization state")]
    InvalidState,

    /// Directly supplied credentials were refused by the platform.
    #[error("{} rejected the supplied credentials", .0.display_name())]
    CredentialsRejected(Platform),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl TokenError {
    pub fn reauthorization(platform: Platform, reason: impl Into<String>) -> Self {
        Self::ReauthorizationRequired {
            platform,
            reason: reason.into(),
        }
    }

    pub fn requires_relink(&self) -> bool {
        matches!(self, Self::NotConnected(_) | Self::ReauthorizationRequired { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }

    /// Maps a token endpoint failure for `platform`.
    ///
    /// A rejected grant (4xx other than 429) means the refresh token is dead.
    pub fn from_endpoint(platform: Platform, err: MarketplaceError) -> Self {
        match err {
            MarketplaceError::RateLimited { retry_after } => Self::RateLimited { retry_after },
            e if e.is_invalid_grant() => Self::reauthorization(platform, e.to_string()),
            e @ (MarketplaceError::Unauthorized { .. } | MarketplaceError::Rejected { .. }) => {
                Self::reauthorization(platform, e.to_string())
            }
            e => Self::Transient(e.to_string()),
        }
    }
}

impl From<crate::Error> for TokenError {
    fn from(err: crate::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
