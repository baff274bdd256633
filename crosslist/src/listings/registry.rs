//! Listing registry: the system of record for (product, platform) listings.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::Result;
use crate::domain::{ListingStatus, NewListing, Platform, PlatformListing};

/// Result of [`ListingRegistry::upsert`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// A new row was written, or a `REMOVED`/`ERROR` row was replaced.
    Created(PlatformListing),
    /// A live or sold row already owns the pair; it is returned untouched.
    AlreadyListed(PlatformListing),
}

impl UpsertOutcome {
    pub fn listing(&self) -> &PlatformListing {
        match self {
            Self::Created(listing) | Self::AlreadyListed(listing) => listing,
        }
    }

    pub fn into_listing(self) -> PlatformListing {
        match self {
            Self::Created(listing) | Self::AlreadyListed(listing) => listing,
        }
    }
}

/// Optional filters for [`ListingRegistry::list`].
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub platform: Option<Platform>,
    pub status: Option<ListingStatus>,
    pub product_id: Option<String>,
}

#[async_trait]
pub trait ListingRegistry: Send + Sync {
    /// Inserts the pair, or replaces it when the existing row is `REMOVED` or `ERROR`.
    ///
    /// The unique (product, platform) constraint decides races: the loser gets
    /// [`UpsertOutcome::AlreadyListed`] with the winner's row.
    async fn upsert(&self, listing: &NewListing) -> Result<UpsertOutcome>;

    async fn get(&self, id: &str) -> Result<PlatformListing>;

    async fn find(&self, product_id: &str, platform: Platform) -> Result<Option<PlatformListing>>;

    async fn find_by_external_id(
        &self,
        platform: Platform,
        external_id: &str,
    ) -> Result<Option<PlatformListing>>;

    async fn list(&self, filter: &ListingFilter) -> Result<Vec<PlatformListing>>;

    async fn list_by_product(&self, product_id: &str) -> Result<Vec<PlatformListing>>;

    async fn list_active_by_platform(&self, platform: Platform) -> Result<Vec<PlatformListing>>;

    /// `ACTIVE` and `ERROR` rows, oldest sync first.
    async fn list_syncable(&self) -> Result<Vec<PlatformListing>>;

    /// `SOLD` rows whose product was never marked sold, i.e. a sale whose
    /// product write failed after the listing was recorded.
    async fn list_sold_unsettled(&self) -> Result<Vec<PlatformListing>>;

    /// Rows whose secondary handle is `external_ref`, e.g. every lot in one auction event.
    async fn list_by_external_ref(
        &self,
        platform: Platform,
        external_ref: &str,
    ) -> Result<Vec<PlatformListing>>;

    /// Applies a state machine transition and clears the failure bookkeeping.
    async fn mark_status(
        &self,
        id: &str,
        status: ListingStatus,
        sale_amount: Option<Decimal>,
    ) -> Result<PlatformListing>;

    /// Moves a live row to `ERROR`, keeping `error` for operators.
    async fn mark_error(&self, id: &str, error: &str) -> Result<PlatformListing>;

    /// Bumps the consecutive failure count without changing status; returns the new count.
    async fn record_sync_failure(&self, id: &str, error: &str) -> Result<u32>;

    /// Records a successful sync; `ERROR` rows return to `ACTIVE`.
    async fn touch_synced(&self, id: &str) -> Result<PlatformListing>;
}
