use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Platform;

/// Stored authorization for one platform. At most one exists per platform.
#[derive(Clone, PartialEq)]
pub struct PlatformConnection {
    pub id: String,
    pub platform: Platform,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// `None` for credentials that never expire (API keys).
    pub expires_at: Option<DateTime<Utc>>,
    /// eBay/Etsy shop id or AuctionFlex company id.
    pub store_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for PlatformConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConnection")
            .field("id", &self.id)
            .field("platform", &self.platform)
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .field("store_id", &self.store_id)
            .field("is_active", &self.is_active)
            .finish()
    }
}

impl PlatformConnection {
    /// True when the access token is usable for at least `skew` longer.
    pub fn is_fresh(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        match self.expires_at {
            None => true,
            Some(expires_at) => expires_at - skew > now,
        }
    }

    pub fn link_state(&self, now: DateTime<Utc>, skew: Duration) -> LinkState {
        if !self.is_active {
            LinkState::Revoked
        } else if self.is_fresh(now, skew) {
            LinkState::Linked
        } else {
            LinkState::Expired
        }
    }
}

/// Token material produced by a link or refresh.
#[derive(Clone, PartialEq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub store_id: Option<String>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .field("store_id", &self.store_id)
            .finish()
    }
}

impl TokenSet {
    pub fn from_expires_in(
        access_token: String,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs)),
            store_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkState {
    Unlinked,
    Linked,
    Expired,
    Revoked,
}
