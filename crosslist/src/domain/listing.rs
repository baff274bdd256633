use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Platform;

/// Lifecycle of a product's listing on one platform.
///
/// `Sold` and `Removed` are terminal; `Error` re-enters `Active` once the
/// platform answers again or the pair is re-published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingStatus {
    Active,
    Sold,
    Removed,
    Error,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Sold => "SOLD",
            Self::Removed => "REMOVED",
            Self::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(Self::Active),
            "SOLD" => Some(Self::Sold),
            "REMOVED" => Some(Self::Removed),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sold | Self::Removed)
    }

    /// Rows the reconciliation pass looks at.
    pub fn is_syncable(&self) -> bool {
        matches!(self, Self::Active | Self::Error)
    }

    pub fn can_transition_to(&self, target: ListingStatus) -> bool {
        use ListingStatus::*;
        match (self, target) {
            (from, to) if *from == to => !from.is_terminal(),
            (Active, Sold | Removed | Error) => true,
            (Error, Active | Sold | Removed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformListing {
    pub id: String,
    pub product_id: String,
    pub platform: Platform,
    pub connection_id: String,
    pub external_id: String,
    pub external_url: Option<String>,
    /// Secondary platform handle: the eBay offer id or the AuctionFlex event id.
    pub external_ref: Option<String>,
    pub status: ListingStatus,
    pub sale_amount: Option<Decimal>,
    pub failure_count: u32,
    pub last_error: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlatformListing {
    pub fn handle(&self) -> ListingHandle {
        ListingHandle {
            external_id: self.external_id.clone(),
            external_ref: self.external_ref.clone(),
        }
    }
}

/// What an adapter needs to address an existing remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingHandle {
    pub external_id: String,
    pub external_ref: Option<String>,
}

/// Registry insert request.
#[derive(Debug, Clone)]
pub struct NewListing {
    pub product_id: String,
    pub platform: Platform,
    pub connection_id: String,
    pub external_id: String,
    pub external_url: Option<String>,
    pub external_ref: Option<String>,
    pub status: ListingStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_are_final() {
        for target in [
            ListingStatus::Active,
            ListingStatus::Sold,
            ListingStatus::Removed,
            ListingStatus::Error,
        ] {
            assert!(!ListingStatus::Sold.can_transition_to(target));
            assert!(!ListingStatus::Removed.can_transition_to(target));
        }
    }

    #[test]
    fn test_live_transitions() {
        assert!(ListingStatus::Active.can_transition_to(ListingStatus::Sold));
        assert!(ListingStatus::Active.can_transition_to(ListingStatus::Removed));
        assert!(ListingStatus::Active.can_transition_to(ListingStatus::Error));
        assert!(ListingStatus::Active.can_transition_to(ListingStatus::Active));
        assert!(ListingStatus::Error.can_transition_to(ListingStatus::Active));
        assert!(ListingStatus::Error.can_transition_to(ListingStatus::Sold));
        assert!(ListingStatus::Error.can_transition_to(ListingStatus::Removed));
    }

    #[test]
    fn test_parse() {
        assert_eq!(ListingStatus::parse("ACTIVE"), Some(ListingStatus::Active));
        assert_eq!(ListingStatus::parse("active"), None);
        assert!(ListingStatus::Error.is_syncable());
        assert!(!ListingStatus::Sold.is_syncable());
    }
}
