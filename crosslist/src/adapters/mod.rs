//! Marketplace adapters.
//!
//! One [`PlatformAdapter`] per marketplace hides that platform's publish
//! sequence, payload shape and status vocabulary behind a common contract.
//! Adapters never fetch or cache credentials themselves: every call receives
//! the [`AccessGrant`] the token manager produced right before it.

pub mod auctionflex;
pub mod ebay;
mod error;
pub mod etsy;
mod registry;

use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::credentials::AccessGrant;
use crate::domain::{ListingHandle, Platform, ProductSnapshot};

pub use auctionflex::AuctionFlexAdapter;
pub use ebay::{EbayAdapter, EbayListingConfig};
pub use error::{ListingError, ListingErrorKind};
pub use etsy::{EtsyAdapter, EtsyListingConfig};
pub use registry::AdapterRegistry;

/// Platform-native attributes, e.g. eBay item specifics.
pub type AttributeSet = BTreeMap<String, Vec<String>>;

/// Per-request inputs some platforms need beyond the product itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossListContext {
    /// AuctionFlex event the lot is added to.
    #[serde(default, alias = "auctionFlexEventId")]
    pub auction_event_id: Option<String>,
}

/// Identity of a listing that is live on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedListing {
    pub external_id: String,
    pub external_url: Option<String>,
    /// See [`crate::domain::PlatformListing::external_ref`].
    pub external_ref: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteState {
    Active,
    Sold,
    /// Closed without a sale.
    Ended,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStatus {
    pub state: RemoteState,
    pub sale_amount: Option<Decimal>,
}

impl RemoteStatus {
    pub fn active() -> Self {
        Self {
            state: RemoteState::Active,
            sale_amount: None,
        }
    }

    pub fn sold(sale_amount: Option<Decimal>) -> Self {
        Self {
            state: RemoteState::Sold,
            sale_amount,
        }
    }

    pub fn ended() -> Self {
        Self {
            state: RemoteState::Ended,
            sale_amount: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOutcome {
    Ended,
    /// The platform no longer knows the listing; treated as already ended.
    NotFound,
}

/// One lot's outcome from a bulk event result pull.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLotResult {
    pub external_id: String,
    pub status: RemoteStatus,
}

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Local checks that would otherwise fail remotely.
    fn check_prerequisites(
        &self,
        product: &ProductSnapshot,
        context: &CrossListContext,
    ) -> Result<(), ListingError> {
        let _ = (product, context);
        Ok(())
    }

    /// Pure mapping of the product onto platform attributes; absent fields are omitted.
    fn map_attributes(&self, product: &ProductSnapshot) -> AttributeSet;

    /// Runs the platform's full publish sequence as one operation.
    async fn create_listing(
        &self,
        product: &ProductSnapshot,
        context: &CrossListContext,
        grant: &AccessGrant,
    ) -> Result<CreatedListing, ListingError>;

    async fn end_listing(
        &self,
        handle: &ListingHandle,
        grant: &AccessGrant,
    ) -> Result<EndOutcome, ListingError>;

    async fn fetch_status(
        &self,
        handle: &ListingHandle,
        grant: &AccessGrant,
    ) -> Result<RemoteStatus, ListingError>;

    /// Bulk status for every lot of an event, for event-scoped platforms.
    async fn fetch_event_results(
        &self,
        event_id: &str,
        grant: &AccessGrant,
    ) -> Result<Vec<EventLotResult>, ListingError> {
        let _ = (event_id, grant);
        Err(ListingError::Unsupported(format!(
            "{} has no auction events",
            self.platform().display_name()
        )))
    }
}

/// Money as a JSON number for APIs that take floats.
pub(crate) fn decimal_to_f64(value: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    value.round_dp(2).to_f64().unwrap_or_default()
}

pub(crate) fn f64_to_decimal(value: f64) -> Option<Decimal> {
    use rust_decimal::prelude::FromPrimitive;
    Decimal::from_f64(value).map(|d| d.round_dp(2))
}

/// Attribute set with single-valued entries for the present fields.
pub(crate) fn push_attr(attrs: &mut AttributeSet, name: &str, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        attrs.insert(name.to_string(), vec![value]);
    }
}
