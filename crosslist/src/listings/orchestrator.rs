//! Cross-list orchestrator.
//!
//! Fans one product out to several platforms. Every platform is an isolated
//! unit of work: its failure is reported in its own result and never affects
//! the others.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

use super::registry::{ListingRegistry, UpsertOutcome};
use crate::adapters::{
    AdapterRegistry, CreatedListing, CrossListContext, EndOutcome, ListingError,
    ListingErrorKind, PlatformAdapter, RemoteState,
};
use crate::credentials::{CredentialStore, TokenManager};
use crate::domain::{
    ListingHandle, ListingStatus, NewListing, Platform, PlatformListing, ProductSnapshot,
};
use crate::products::ProductStore;

/// Outcome of cross-listing to one platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossListResult {
    pub platform: Platform,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ListingErrorKind>,
    /// The pair was already live; nothing was created.
    pub already_listed: bool,
}

impl CrossListResult {
    fn listed(platform: Platform, listing: &PlatformListing, already_listed: bool) -> Self {
        Self {
            platform,
            success: true,
            listing_id: Some(listing.external_id.clone()),
            url: listing.external_url.clone(),
            error: None,
            error_kind: None,
            already_listed,
        }
    }

    fn failed(platform: Platform, err: &ListingError) -> Self {
        Self {
            platform,
            success: false,
            listing_id: None,
            url: None,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            already_listed: false,
        }
    }
}

/// Read model for a product's listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListingView {
    pub platform: Platform,
    pub status: ListingStatus,
    pub external_id: String,
    pub url: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub sale_amount: Option<rust_decimal::Decimal>,
    pub last_error: Option<String>,
}

impl From<PlatformListing> for ProductListingView {
    fn from(listing: PlatformListing) -> Self {
        Self {
            platform: listing.platform,
            status: listing.status,
            external_id: listing.external_id,
            url: listing.external_url,
            last_sync_at: listing.last_synced_at,
            sale_amount: listing.sale_amount,
            last_error: listing.last_error,
        }
    }
}

type PairKey = (String, Platform);

pub struct CrossListOrchestrator {
    tokens: Arc<TokenManager>,
    connections: Arc<dyn CredentialStore>,
    adapters: AdapterRegistry,
    registry: Arc<dyn ListingRegistry>,
    products: Arc<dyn ProductStore>,
    /// Serializes create/remove for one (product, platform) pair in this process.
    pair_locks: DashMap<PairKey, Arc<Mutex<()>>>,
}

impl CrossListOrchestrator {
    pub fn new(
        tokens: Arc<TokenManager>,
        connections: Arc<dyn CredentialStore>,
        adapters: AdapterRegistry,
        registry: Arc<dyn ListingRegistry>,
        products: Arc<dyn ProductStore>,
    ) -> Self {
        Self {
            tokens,
            connections,
            adapters,
            registry,
            products,
            pair_locks: DashMap::new(),
        }
    }

    /// Loads the product and cross-lists it.
    ///
    /// Fails only when the product cannot be loaded; platform failures are
    /// reported per result.
    pub async fn cross_list(
        self: &Arc<Self>,
        product_id: &str,
        platforms: &[Platform],
        context: CrossListContext,
    ) -> crate::Result<Vec<CrossListResult>> {
        let product = self.products.get_product(product_id).await?;
        Ok(self.cross_list_product(product, platforms, context).await)
    }

    /// Publishes `product` to every requested platform concurrently.
    ///
    /// Returns exactly one result per distinct platform. Each platform runs in
    /// its own task, so abandoning this future does not interrupt publishes
    /// already under way.
    #[instrument(skip_all, fields(product_id = %product.id))]
    pub async fn cross_list_product(
        self: &Arc<Self>,
        product: ProductSnapshot,
        platforms: &[Platform],
        context: CrossListContext,
    ) -> Vec<CrossListResult> {
        let platforms: BTreeSet<Platform> = platforms.iter().copied().collect();
        let product = Arc::new(product);
        let context = Arc::new(context);

        let tasks: Vec<_> = platforms
            .into_iter()
            .map(|platform| {
                let this = Arc::clone(self);
                let product = Arc::clone(&product);
                let context = Arc::clone(&context);
                let span = info_span!("cross_list_platform", %platform);
                let handle = tokio::spawn(
                    async move { this.list_on_platform(&product, platform, &context).await }
                        .instrument(span),
                );
                (platform, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(tasks.len());
        for (platform, handle) in tasks {
            let result = match handle.await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    warn!(%platform, error = %e, kind = %e.kind(), "Cross-list failed");
                    CrossListResult::failed(platform, &e)
                }
                Err(join_err) => {
                    error!(%platform, error = %join_err, "Cross-list task panicked");
                    CrossListResult::failed(platform, &ListingError::Internal(join_err.to_string()))
                }
            };
            results.push(result);
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        info!(succeeded, requested = results.len(), "Cross-list finished");
        results
    }

    async fn list_on_platform(
        &self,
        product: &ProductSnapshot,
        platform: Platform,
        context: &CrossListContext,
    ) -> Result<CrossListResult, ListingError> {
        let adapter = self.adapter(platform)?;

        let connected = self
            .connections
            .get(platform)
            .await?
            .is_some_and(|c| c.is_active);
        if !connected {
            return Err(ListingError::NotConnected(platform));
        }

        let key = (product.id.clone(), platform);
        let lock = self.pair_lock(&key);
        let result = {
            let _guard = lock.lock().await;
            self.list_locked(product, platform, context, adapter.as_ref()).await
        };
        drop(lock);
        self.release_pair_lock(&key);
        result
    }

    async fn list_locked(
        &self,
        product: &ProductSnapshot,
        platform: Platform,
        context: &CrossListContext,
        adapter: &dyn PlatformAdapter,
    ) -> Result<CrossListResult, ListingError> {
        if let Some(existing) = self.registry.find(&product.id, platform).await? {
            match existing.status {
                ListingStatus::Active => {
                    debug!(listing_id = %existing.id, "Already listed");
                    return Ok(CrossListResult::listed(platform, &existing, true));
                }
                ListingStatus::Sold => return Err(ListingError::AlreadySold),
                ListingStatus::Error => {
                    if let Some(result) = self.revive_errored(&existing, adapter).await? {
                        return Ok(result);
                    }
                }
                ListingStatus::Removed => {}
            }
        }

        if product.is_sold() {
            return Err(ListingError::AlreadySold);
        }
        adapter.check_prerequisites(product, context)?;

        let grant = self.tokens.ensure_valid_token(platform).await?;
        let created = adapter.create_listing(product, context, &grant).await?;
        info!(external_id = %created.external_id, "Listing created");

        let new_listing = NewListing {
            product_id: product.id.clone(),
            platform,
            connection_id: grant.connection_id.clone(),
            external_id: created.external_id.clone(),
            external_url: created.external_url.clone(),
            external_ref: created.external_ref.clone(),
            status: ListingStatus::Active,
        };

        match self.registry.upsert(&new_listing).await {
            Ok(UpsertOutcome::Created(listing)) => {
                Ok(CrossListResult::listed(platform, &listing, false))
            }
            Ok(UpsertOutcome::AlreadyListed(existing)) => {
                // Another process won the pair; withdraw the duplicate we just made.
                warn!(
                    existing_id = %existing.external_id,
                    duplicate_id = %created.external_id,
                    "Pair was listed concurrently; ending duplicate"
                );
                self.end_orphan(adapter, &created).await;
                match existing.status {
                    ListingStatus::Sold => Err(ListingError::AlreadySold),
                    _ => Ok(CrossListResult::listed(platform, &existing, true)),
                }
            }
            Err(e) => {
                error!(
                    external_id = %created.external_id,
                    error = %e,
                    "Listing is live but could not be recorded"
                );
                Err(e.into())
            }
        }
    }

    /// Checks whether an `ERROR` row is still live remotely before creating a new listing.
    ///
    /// Returns a result when no new listing should be created.
    async fn revive_errored(
        &self,
        existing: &PlatformListing,
        adapter: &dyn PlatformAdapter,
    ) -> Result<Option<CrossListResult>, ListingError> {
        let grant = self.tokens.ensure_valid_token(existing.platform).await?;
        match adapter.fetch_status(&existing.handle(), &grant).await?.state {
            RemoteState::Active => {
                let listing = self.registry.touch_synced(&existing.id).await?;
                info!(listing_id = %listing.id, "Errored listing is live again");
                Ok(Some(CrossListResult::listed(existing.platform, &listing, true)))
            }
            // Reconciliation records the sale and closes the siblings.
            RemoteState::Sold => Err(ListingError::AlreadySold),
            RemoteState::Ended => Ok(None),
        }
    }

    async fn end_orphan(&self, adapter: &dyn PlatformAdapter, created: &CreatedListing) {
        let handle = ListingHandle {
            external_id: created.external_id.clone(),
            external_ref: created.external_ref.clone(),
        };
        let outcome = match self.tokens.ensure_valid_token(adapter.platform()).await {
            Ok(grant) => adapter.end_listing(&handle, &grant).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = outcome {
            error!(external_id = %created.external_id, error = %e, "Failed to end duplicate listing");
        }
    }

    /// Ends the product's listing on `platform` and marks it `REMOVED`.
    ///
    /// Removing an already removed listing succeeds; a sold one cannot be removed.
    #[instrument(skip(self), fields(product_id = %product_id, platform = %platform))]
    pub async fn remove_from_platform(
        &self,
        product_id: &str,
        platform: Platform,
    ) -> Result<PlatformListing, ListingError> {
        let adapter = self.adapter(platform)?;

        let key = (product_id.to_string(), platform);
        let lock = self.pair_lock(&key);
        let result = {
            let _guard = lock.lock().await;
            self.remove_locked(product_id, platform, adapter.as_ref()).await
        };
        drop(lock);
        self.release_pair_lock(&key);
        result
    }

    async fn remove_locked(
        &self,
        product_id: &str,
        platform: Platform,
        adapter: &dyn PlatformAdapter,
    ) -> Result<PlatformListing, ListingError> {
        let listing = self
            .registry
            .find(product_id, platform)
            .await?
            .ok_or_else(|| {
                ListingError::NotFound(format!(
                    "product {product_id} is not listed on {}",
                    platform.display_name()
                ))
            })?;

        match listing.status {
            ListingStatus::Sold => return Err(ListingError::AlreadySold),
            ListingStatus::Removed => return Ok(listing),
            ListingStatus::Active | ListingStatus::Error => {}
        }

        let grant = self.tokens.ensure_valid_token(platform).await?;
        match adapter.end_listing(&listing.handle(), &grant).await? {
            EndOutcome::Ended => info!(external_id = %listing.external_id, "Listing ended"),
            EndOutcome::NotFound => {
                warn!(external_id = %listing.external_id, "Listing already gone on platform")
            }
        }

        Ok(self
            .registry
            .mark_status(&listing.id, ListingStatus::Removed, None)
            .await?)
    }

    pub async fn product_listings(&self, product_id: &str) -> crate::Result<Vec<ProductListingView>> {
        let listings = self.registry.list_by_product(product_id).await?;
        Ok(listings.into_iter().map(ProductListingView::from).collect())
    }

    /// Platforms with an active connection and a configured adapter.
    pub async fn active_connections(&self) -> crate::Result<Vec<Platform>> {
        let connections = self.connections.list_active().await?;
        Ok(connections
            .into_iter()
            .map(|c| c.platform)
            .filter(|p| self.adapters.get(*p).is_some())
            .collect())
    }

    fn adapter(&self, platform: Platform) -> Result<Arc<dyn PlatformAdapter>, ListingError> {
        self.adapters.get(platform).ok_or_else(|| {
            ListingError::Unsupported(format!("{} is not configured", platform.display_name()))
        })
    }

    fn pair_lock(&self, key: &PairKey) -> Arc<Mutex<()>> {
        self.pair_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release_pair_lock(&self, key: &PairKey) {
        self.pair_locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
