//! Reconciliation of local listing state with the platforms.
//!
//! A sale observed anywhere (polled status, event results, or a webhook)
//! goes through [`ReconciliationSync::record_sale`], which marks the product
//! sold and closes every sibling listing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::registry::ListingRegistry;
use crate::adapters::{
    AdapterRegistry, EndOutcome, ListingError, ListingErrorKind, PlatformAdapter, RemoteState,
    RemoteStatus,
};
use crate::credentials::TokenManager;
use crate::domain::{ListingStatus, Platform, PlatformListing};
use crate::products::ProductStore;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Consecutive status failures before an `ACTIVE` row is flagged `ERROR`.
    pub error_threshold: u32,
    /// Products reconciled in parallel.
    pub concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            error_threshold: 5,
            concurrency: 4,
        }
    }
}

/// Counts from one reconciliation pass.
///
/// `synced` counts every row whose remote state was applied; `sold` and
/// `removed` break that down. Listings closed by a cascade add to `removed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub synced: usize,
    pub sold: usize,
    pub removed: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl SyncSummary {
    fn merge(&mut self, other: SyncSummary) {
        self.synced += other.synced;
        self.sold += other.sold;
        self.removed += other.removed;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }

    fn add_cascade(&mut self, cascade: CascadeReport) {
        self.removed += cascade.closed;
        self.errors += cascade.failed;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CascadeReport {
    closed: usize,
    failed: usize,
}

/// Result of recording a sale reported by a platform.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleConfirmation {
    pub listing: PlatformListing,
    /// The sale had already been recorded; nothing changed except retried closes.
    pub already_recorded: bool,
    /// This sale flipped the product to `SOLD`.
    pub product_marked_sold: bool,
    pub closed_listings: usize,
    pub failed_closes: usize,
}

enum Applied {
    Active,
    Removed,
    Sold(CascadeReport),
}

pub struct ReconciliationSync {
    tokens: Arc<TokenManager>,
    adapters: AdapterRegistry,
    registry: Arc<dyn ListingRegistry>,
    products: Arc<dyn ProductStore>,
    config: SyncConfig,
    /// Serializes sale handling per product across polling and webhooks.
    product_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ReconciliationSync {
    pub fn new(
        tokens: Arc<TokenManager>,
        adapters: AdapterRegistry,
        registry: Arc<dyn ListingRegistry>,
        products: Arc<dyn ProductStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            tokens,
            adapters,
            registry,
            products,
            config,
            product_locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Polls every `ACTIVE` or `ERROR` listing and applies what the platforms report.
    ///
    /// Products with a recorded sale that never reached the product store are
    /// settled first. Failures are counted in the summary; only an unreadable
    /// registry fails the pass.
    #[instrument(skip(self))]
    pub async fn sync_all(&self) -> crate::Result<SyncSummary> {
        let mut rows = self.registry.list_syncable().await?;
        rows.extend(self.registry.list_sold_unsettled().await?);
        let mut by_product: BTreeMap<String, Vec<PlatformListing>> = BTreeMap::new();
        for row in rows {
            by_product.entry(row.product_id.clone()).or_default().push(row);
        }
        let products = by_product.len();

        let summary = stream::iter(by_product)
            .map(|(product_id, rows)| async move { self.sync_product(&product_id, rows).await })
            .buffer_unordered(self.config.concurrency.max(1))
            .fold(SyncSummary::default(), |mut acc, part| async move {
                acc.merge(part);
                acc
            })
            .await;

        info!(
            products,
            synced = summary.synced,
            sold = summary.sold,
            removed = summary.removed,
            skipped = summary.skipped,
            errors = summary.errors,
            "Reconciliation pass finished"
        );
        Ok(summary)
    }

    async fn sync_product(&self, product_id: &str, rows: Vec<PlatformListing>) -> SyncSummary {
        let lock = self.product_lock(product_id);
        let summary = {
            let _guard = lock.lock().await;
            self.sync_product_locked(product_id, rows).await
        };
        drop(lock);
        self.release_product_lock(product_id);
        summary
    }

    async fn sync_product_locked(
        &self,
        product_id: &str,
        rows: Vec<PlatformListing>,
    ) -> SyncSummary {
        let mut summary = SyncSummary::default();

        let siblings = match self.registry.list_by_product(product_id).await {
            Ok(siblings) => siblings,
            Err(e) => {
                error!(product_id, error = %e, "Failed to load listings");
                summary.errors += rows.len();
                return summary;
            }
        };

        // A sold listing here means an earlier sale did not finish: the product
        // write or a sibling close failed.
        if let Some(sold) = siblings.iter().find(|l| l.status == ListingStatus::Sold) {
            if let Err(e) = self.settle_product(sold, None).await {
                error!(product_id, error = %e, "Failed to mark product sold");
                summary.errors += 1;
                return summary;
            }
            debug!(product_id, sold_on = %sold.platform, "Retrying cascade close");
            summary.add_cascade(self.cascade_close(product_id, &sold.id, &siblings).await);
            return summary;
        }

        for row in rows {
            let status = match self.fetch_remote(&row).await {
                Ok(status) => status,
                Err(e) if skips_row(&e) => {
                    debug!(listing_id = %row.id, platform = %row.platform, error = %e, "Skipping listing");
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    self.record_failure(&row, &e).await;
                    summary.errors += 1;
                    continue;
                }
            };

            match self.apply_remote(&row, status).await {
                Ok(Applied::Active) => summary.synced += 1,
                Ok(Applied::Removed) => {
                    summary.synced += 1;
                    summary.removed += 1;
                }
                Ok(Applied::Sold(cascade)) => {
                    summary.synced += 1;
                    summary.sold += 1;
                    summary.add_cascade(cascade);
                    // The cascade already handled the remaining siblings.
                    break;
                }
                Err(e) => {
                    error!(listing_id = %row.id, error = %e, "Failed to apply remote status");
                    summary.errors += 1;
                }
            }
        }

        summary
    }

    /// Pulls an event's results in one call and applies them to its lots.
    ///
    /// Lots missing from the results are left untouched and counted as skipped.
    #[instrument(skip(self), fields(platform = %platform, event_id = %event_id))]
    pub async fn sync_event(&self, platform: Platform, event_id: &str) -> crate::Result<SyncSummary> {
        let rows: Vec<PlatformListing> = self
            .registry
            .list_by_external_ref(platform, event_id)
            .await?
            .into_iter()
            .filter(|l| l.status.is_syncable())
            .collect();

        let mut summary = SyncSummary::default();
        if rows.is_empty() {
            debug!("No open lots for event");
            return Ok(summary);
        }

        let results = match self.fetch_event(platform, event_id).await {
            Ok(results) => results,
            Err(e) if skips_row(&e) => {
                warn!(error = %e, "Skipping event sync");
                summary.skipped = rows.len();
                return Ok(summary);
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch event results");
                for row in &rows {
                    self.record_failure(row, &e).await;
                }
                summary.errors = rows.len();
                return Ok(summary);
            }
        };

        for row in rows {
            let Some(status) = results.get(&row.external_id).cloned() else {
                summary.skipped += 1;
                continue;
            };

            let lock = self.product_lock(&row.product_id);
            let applied = {
                let _guard = lock.lock().await;
                // Re-read under the lock; an earlier lot of the same product may have sold.
                match self.registry.get(&row.id).await {
                    Ok(current) if current.status.is_syncable() => {
                        Some(self.apply_remote(&current, status).await)
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(e)),
                }
            };
            drop(lock);
            self.release_product_lock(&row.product_id);

            match applied {
                None => summary.skipped += 1,
                Some(Ok(Applied::Active)) => summary.synced += 1,
                Some(Ok(Applied::Removed)) => {
                    summary.synced += 1;
                    summary.removed += 1;
                }
                Some(Ok(Applied::Sold(cascade))) => {
                    summary.synced += 1;
                    summary.sold += 1;
                    summary.add_cascade(cascade);
                }
                Some(Err(e)) => {
                    error!(listing_id = %row.id, error = %e, "Failed to apply lot result");
                    summary.errors += 1;
                }
            }
        }

        info!(
            synced = summary.synced,
            sold = summary.sold,
            skipped = summary.skipped,
            errors = summary.errors,
            "Event sync finished"
        );
        Ok(summary)
    }

    /// Records a sale pushed by a platform.
    ///
    /// Idempotent: a repeated notification for a sold listing changes nothing
    /// but retries any sibling close that failed before.
    #[instrument(skip(self), fields(platform = %platform, external_id = %external_id))]
    pub async fn confirm_sale(
        &self,
        platform: Platform,
        external_id: &str,
        amount: Option<Decimal>,
    ) -> Result<SaleConfirmation, ListingError> {
        let listing = self
            .registry
            .find_by_external_id(platform, external_id)
            .await?
            .ok_or_else(|| {
                ListingError::NotFound(format!(
                    "no {} listing with id {external_id}",
                    platform.display_name()
                ))
            })?;

        let lock = self.product_lock(&listing.product_id);
        let result = {
            let _guard = lock.lock().await;
            self.confirm_sale_locked(listing.clone(), amount).await
        };
        drop(lock);
        self.release_product_lock(&listing.product_id);
        result
    }

    async fn confirm_sale_locked(
        &self,
        listing: PlatformListing,
        amount: Option<Decimal>,
    ) -> Result<SaleConfirmation, ListingError> {
        // Re-read under the lock so a concurrent poll is observed.
        let listing = self.registry.get(&listing.id).await?;

        match listing.status {
            ListingStatus::Sold => {
                debug!(listing_id = %listing.id, "Sale already recorded");
                let first = self.settle_product(&listing, amount).await?;
                let siblings = self.registry.list_by_product(&listing.product_id).await?;
                let cascade = self
                    .cascade_close(&listing.product_id, &listing.id, &siblings)
                    .await;
                Ok(SaleConfirmation {
                    listing,
                    already_recorded: true,
                    product_marked_sold: first,
                    closed_listings: cascade.closed,
                    failed_closes: cascade.failed,
                })
            }
            ListingStatus::Removed => {
                // Sold in the window before the withdrawal reached the platform.
                warn!(listing_id = %listing.id, "Sale reported for a removed listing");
                let first = self.products.mark_sold(&listing.product_id, amount).await?;
                let siblings = self.registry.list_by_product(&listing.product_id).await?;
                let cascade = self
                    .cascade_close(&listing.product_id, &listing.id, &siblings)
                    .await;
                Ok(SaleConfirmation {
                    listing,
                    already_recorded: false,
                    product_marked_sold: first,
                    closed_listings: cascade.closed,
                    failed_closes: cascade.failed,
                })
            }
            ListingStatus::Active | ListingStatus::Error => {
                let (listing, first, cascade) = self.record_sale(&listing, amount).await?;
                Ok(SaleConfirmation {
                    listing,
                    already_recorded: false,
                    product_marked_sold: first,
                    closed_listings: cascade.closed,
                    failed_closes: cascade.failed,
                })
            }
        }
    }

    async fn apply_remote(
        &self,
        row: &PlatformListing,
        status: RemoteStatus,
    ) -> crate::Result<Applied> {
        match status.state {
            RemoteState::Active => {
                self.registry.touch_synced(&row.id).await?;
                Ok(Applied::Active)
            }
            RemoteState::Ended => {
                self.registry
                    .mark_status(&row.id, ListingStatus::Removed, None)
                    .await?;
                info!(listing_id = %row.id, platform = %row.platform, "Listing ended on platform");
                Ok(Applied::Removed)
            }
            RemoteState::Sold => {
                let (_, _, cascade) = self.record_sale(row, status.sale_amount).await?;
                Ok(Applied::Sold(cascade))
            }
        }
    }

    /// Marks the listing and the product sold, then closes the siblings.
    ///
    /// Returns the updated listing and whether this sale was the first for the product.
    async fn record_sale(
        &self,
        listing: &PlatformListing,
        amount: Option<Decimal>,
    ) -> crate::Result<(PlatformListing, bool, CascadeReport)> {
        let sold = self
            .registry
            .mark_status(&listing.id, ListingStatus::Sold, amount)
            .await?;
        info!(
            listing_id = %sold.id,
            product_id = %sold.product_id,
            platform = %sold.platform,
            amount = ?amount,
            "Sale recorded"
        );

        let first = self.products.mark_sold(&sold.product_id, amount).await?;
        if !first {
            warn!(product_id = %sold.product_id, "Product was already sold elsewhere");
        }

        let siblings = self.registry.list_by_product(&sold.product_id).await?;
        let cascade = self.cascade_close(&sold.product_id, &sold.id, &siblings).await;
        Ok((sold, first, cascade))
    }

    /// Marks the product of an already `SOLD` listing sold, in case the write
    /// failed when the sale was recorded. A no-op for settled products.
    async fn settle_product(
        &self,
        sold: &PlatformListing,
        reported: Option<Decimal>,
    ) -> crate::Result<bool> {
        let amount = sold.sale_amount.or(reported);
        let first = self.products.mark_sold(&sold.product_id, amount).await?;
        if first {
            info!(
                product_id = %sold.product_id,
                platform = %sold.platform,
                "Product marked sold for an earlier sale"
            );
        }
        Ok(first)
    }

    /// Ends every open sibling of a sold listing.
    ///
    /// A sibling that cannot be closed is flagged `ERROR` so the next pass
    /// retries it before anything else.
    async fn cascade_close(
        &self,
        product_id: &str,
        sold_listing_id: &str,
        siblings: &[PlatformListing],
    ) -> CascadeReport {
        let mut report = CascadeReport::default();
        for sibling in siblings
            .iter()
            .filter(|l| l.id != sold_listing_id && l.status.is_syncable())
        {
            match self.close_listing(sibling).await {
                Ok(outcome) => {
                    match self
                        .registry
                        .mark_status(&sibling.id, ListingStatus::Removed, None)
                        .await
                    {
                        Ok(_) => {
                            info!(
                                product_id,
                                platform = %sibling.platform,
                                ?outcome,
                                "Sibling listing closed"
                            );
                            report.closed += 1;
                        }
                        Err(e) => {
                            error!(listing_id = %sibling.id, error = %e, "Failed to record closed sibling");
                            report.failed += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        product_id,
                        platform = %sibling.platform,
                        error = %e,
                        "Failed to close sibling listing"
                    );
                    let message = format!("close after sale failed: {e}");
                    if let Err(mark_err) = self.registry.mark_error(&sibling.id, &message).await {
                        error!(listing_id = %sibling.id, error = %mark_err, "Failed to flag sibling");
                    }
                    report.failed += 1;
                }
            }
        }
        report
    }

    async fn close_listing(&self, listing: &PlatformListing) -> Result<EndOutcome, ListingError> {
        let adapter = self.adapter(listing.platform)?;
        let grant = self.tokens.ensure_valid_token(listing.platform).await?;
        adapter.end_listing(&listing.handle(), &grant).await
    }

    async fn fetch_remote(&self, listing: &PlatformListing) -> Result<RemoteStatus, ListingError> {
        let adapter = self.adapter(listing.platform)?;
        let grant = self.tokens.ensure_valid_token(listing.platform).await?;
        adapter.fetch_status(&listing.handle(), &grant).await
    }

    async fn fetch_event(
        &self,
        platform: Platform,
        event_id: &str,
    ) -> Result<HashMap<String, RemoteStatus>, ListingError> {
        let adapter = self.adapter(platform)?;
        let grant = self.tokens.ensure_valid_token(platform).await?;
        let results = adapter.fetch_event_results(event_id, &grant).await?;
        Ok(results
            .into_iter()
            .map(|r| (r.external_id, r.status))
            .collect())
    }

    /// Counts a failed status check; past the threshold an `ACTIVE` row becomes `ERROR`.
    async fn record_failure(&self, row: &PlatformListing, err: &ListingError) {
        let message = err.to_string();
        let count = match self.registry.record_sync_failure(&row.id, &message).await {
            Ok(count) => count,
            Err(e) => {
                error!(listing_id = %row.id, error = %e, "Failed to record sync failure");
                return;
            }
        };
        warn!(
            listing_id = %row.id,
            platform = %row.platform,
            failures = count,
            error = %message,
            "Status check failed"
        );

        if row.status == ListingStatus::Active && count >= self.config.error_threshold {
            match self.registry.mark_error(&row.id, &message).await {
                Ok(_) => warn!(listing_id = %row.id, "Listing flagged ERROR after repeated failures"),
                Err(e) => error!(listing_id = %row.id, error = %e, "Failed to flag listing"),
            }
        }
    }

    fn adapter(&self, platform: Platform) -> Result<Arc<dyn PlatformAdapter>, ListingError> {
        self.adapters.get(platform).ok_or_else(|| {
            ListingError::Unsupported(format!("{} is not configured", platform.display_name()))
        })
    }

    fn product_lock(&self, product_id: &str) -> Arc<Mutex<()>> {
        self.product_locks
            .entry(product_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release_product_lock(&self, product_id: &str) {
        self.product_locks
            .remove_if(product_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Errors that say nothing about the listing itself: the platform is not
/// configured or the account needs relinking. They leave the row untouched.
fn skips_row(err: &ListingError) -> bool {
    matches!(
        err.kind(),
        ListingErrorKind::NotConnected
            | ListingErrorKind::ReauthorizationRequired
            | ListingErrorKind::Unsupported
    )
}
