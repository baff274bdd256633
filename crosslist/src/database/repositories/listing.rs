//! Platform listing repository (SQLx).

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use crate::database::models::PlatformListingDbModel;
use crate::database::retry::retry_on_busy;
use crate::database::time::{decimal_to_db, now_ms};
use crate::domain::{ListingStatus, NewListing, Platform, PlatformListing};
use crate::listings::{ListingFilter, ListingRegistry, UpsertOutcome};
use crate::{Error, Result};

/// SQLx-backed listing registry.
pub struct SqlxListingRegistry {
    pool: SqlitePool,
}

impl SqlxListingRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: &str) -> Result<Option<PlatformListingDbModel>> {
        let row = sqlx::query_as::<_, PlatformListingDbModel>(
            "SELECT * FROM platform_listings WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Error for a conditional update that matched nothing.
    async fn rejected_update(&self, id: &str, target: ListingStatus) -> Error {
        match self.fetch(id).await {
            Ok(Some(row)) => Error::invalid_transition(row.status, target),
            Ok(None) => Error::not_found("Listing", id),
            Err(e) => e,
        }
    }
}

fn into_listings(rows: Vec<PlatformListingDbModel>) -> Result<Vec<PlatformListing>> {
    rows.into_iter().map(PlatformListing::try_from).collect()
}

#[async_trait]
impl ListingRegistry for SqlxListingRegistry {
    #[instrument(skip(self, listing), fields(product_id = %listing.product_id, platform = %listing.platform))]
    async fn upsert(&self, listing: &NewListing) -> Result<UpsertOutcome> {
        let id = uuid::Uuid::new_v4().to_string();
        let written = retry_on_busy("upsert_listing", || async {
            let now = now_ms();
            let row = sqlx::query_as::<_, PlatformListingDbModel>(
                r#"
                INSERT INTO platform_listings
                    (id, product_id, platform, connection_id, external_id, external_url, external_ref,
                     status, failure_count, last_synced_at, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
                ON CONFLICT(product_id, platform) DO UPDATE SET
                    connection_id = excluded.connection_id,
                    external_id = excluded.external_id,
                    external_url = excluded.external_url,
                    external_ref = excluded.external_ref,
                    status = excluded.status,
                    sale_amount = NULL,
                    failure_count = 0,
                    last_error = NULL,
                    last_synced_at = excluded.last_synced_at,
                    updated_at = excluded.updated_at
                WHERE platform_listings.status IN ('REMOVED', 'ERROR')
                RETURNING *
                "#,
            )
            .bind(&id)
            .bind(&listing.product_id)
            .bind(listing.platform.as_str())
            .bind(&listing.connection_id)
            .bind(&listing.external_id)
            .bind(&listing.external_url)
            .bind(&listing.external_ref)
            .bind(listing.status.as_str())
            .bind(now)
            .bind(now)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        })
        .await?;

        if let Some(row) = written {
            debug!(listing_id = %row.id, external_id = %row.external_id, "Listing recorded");
            return Ok(UpsertOutcome::Created(PlatformListing::try_from(row)?));
        }

        // The pair is owned by a live or sold row.
        let existing = self
            .find(&listing.product_id, listing.platform)
            .await?
            .ok_or_else(|| Error::not_found("Listing", &listing.product_id))?;
        debug!(listing_id = %existing.id, status = %existing.status, "Pair already listed");
        Ok(UpsertOutcome::AlreadyListed(existing))
    }

    async fn get(&self, id: &str) -> Result<PlatformListing> {
        self.fetch(id)
            .await?
            .ok_or_else(|| Error::not_found("Listing", id))
            .and_then(PlatformListing::try_from)
    }

    async fn find(&self, product_id: &str, platform: Platform) -> Result<Option<PlatformListing>> {
        sqlx::query_as::<_, PlatformListingDbModel>(
            "SELECT * FROM platform_listings WHERE product_id = ? AND platform = ?",
        )
        .bind(product_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(PlatformListing::try_from)
        .transpose()
    }

    async fn find_by_external_id(
        &self,
        platform: Platform,
        external_id: &str,
    ) -> Result<Option<PlatformListing>> {
        // A replaced pair keeps one row, so at most one row carries the id; newest wins otherwise.
        sqlx::query_as::<_, PlatformListingDbModel>(
            r#"
            SELECT * FROM platform_listings
            WHERE platform = ? AND external_id = ?
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(platform.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?
        .map(PlatformListing::try_from)
        .transpose()
    }

    async fn list(&self, filter: &ListingFilter) -> Result<Vec<PlatformListing>> {
        let platform = filter.platform.map(|p| p.as_str());
        let status = filter.status.map(|s| s.as_str());
        let rows = sqlx::query_as::<_, PlatformListingDbModel>(
            r#"
            SELECT * FROM platform_listings
            WHERE (? IS NULL OR platform = ?)
              AND (? IS NULL OR status = ?)
              AND (? IS NULL OR product_id = ?)
            ORDER BY updated_at DESC
            "#,
        )
        .bind(platform)
        .bind(platform)
        .bind(status)
        .bind(status)
        .bind(&filter.product_id)
        .bind(&filter.product_id)
        .fetch_all(&self.pool)
        .await?;
        into_listings(rows)
    }

    async fn list_by_product(&self, product_id: &str) -> Result<Vec<PlatformListing>> {
        let rows = sqlx::query_as::<_, PlatformListingDbModel>(
            "SELECT * FROM platform_listings WHERE product_id = ? ORDER BY platform",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        into_listings(rows)
    }

    async fn list_active_by_platform(&self, platform: Platform) -> Result<Vec<PlatformListing>> {
        let rows = sqlx::query_as::<_, PlatformListingDbModel>(
            "SELECT * FROM platform_listings WHERE platform = ? AND status = 'ACTIVE' ORDER BY created_at",
        )
        .bind(platform.as_str())
        .fetch_all(&self.pool)
        .await?;
        into_listings(rows)
    }

    async fn list_syncable(&self) -> Result<Vec<PlatformListing>> {
        let rows = sqlx::query_as::<_, PlatformListingDbModel>(
            r#"
            SELECT * FROM platform_listings
            WHERE status IN ('ACTIVE', 'ERROR')
            ORDER BY COALESCE(last_synced_at, 0), created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        into_listings(rows)
    }

    async fn list_sold_unsettled(&self) -> Result<Vec<PlatformListing>> {
        let rows = sqlx::query_as::<_, PlatformListingDbModel>(
            r#"
            SELECT l.* FROM platform_listings l
            JOIN products p ON p.id = l.product_id
            WHERE l.status = 'SOLD' AND p.status != 'SOLD'
            ORDER BY l.updated_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        into_listings(rows)
    }

    async fn list_by_external_ref(
        &self,
        platform: Platform,
        external_ref: &str,
    ) -> Result<Vec<PlatformListing>> {
        let rows = sqlx::query_as::<_, PlatformListingDbModel>(
            "SELECT * FROM platform_listings WHERE platform = ? AND external_ref = ? ORDER BY created_at",
        )
        .bind(platform.as_str())
        .bind(external_ref)
        .fetch_all(&self.pool)
        .await?;
        into_listings(rows)
    }

    #[instrument(skip(self), fields(listing_id = %id, status = %status))]
    async fn mark_status(
        &self,
        id: &str,
        status: ListingStatus,
        sale_amount: Option<Decimal>,
    ) -> Result<PlatformListing> {
        let current = self.get(id).await?;
        if !current.status.can_transition_to(status) {
            return Err(Error::invalid_transition(current.status, status));
        }

        let amount = decimal_to_db(sale_amount);
        // Compare-and-set on the status we validated against.
        let updated = retry_on_busy("mark_listing_status", || async {
            let now = now_ms();
            let row = sqlx::query_as::<_, PlatformListingDbModel>(
                r#"
                UPDATE platform_listings
                SET status = ?,
                    sale_amount = COALESCE(?, sale_amount),
                    failure_count = 0,
                    last_error = NULL,
                    last_synced_at = ?,
                    updated_at = ?
                WHERE id = ? AND status = ?
                RETURNING *
                "#,
            )
            .bind(status.as_str())
            .bind(&amount)
            .bind(now)
            .bind(now)
            .bind(id)
            .bind(current.status.as_str())
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        })
        .await?;

        match updated {
            Some(row) => {
                debug!(from = %current.status, "Listing status updated");
                PlatformListing::try_from(row)
            }
            None => Err(self.rejected_update(id, status).await),
        }
    }

    #[instrument(skip(self, error), fields(listing_id = %id))]
    async fn mark_error(&self, id: &str, error: &str) -> Result<PlatformListing> {
        let updated = retry_on_busy("mark_listing_error", || async {
            let row = sqlx::query_as::<_, PlatformListingDbModel>(
                r#"
                UPDATE platform_listings
                SET status = 'ERROR', last_error = ?, updated_at = ?
                WHERE id = ? AND status IN ('ACTIVE', 'ERROR')
                RETURNING *
                "#,
            )
            .bind(error)
            .bind(now_ms())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        })
        .await?;

        match updated {
            Some(row) => PlatformListing::try_from(row),
            None => Err(self.rejected_update(id, ListingStatus::Error).await),
        }
    }

    async fn record_sync_failure(&self, id: &str, error: &str) -> Result<u32> {
        let count = retry_on_busy("record_sync_failure", || async {
            let count: Option<i64> = sqlx::query_scalar(
                r#"
                UPDATE platform_listings
                SET failure_count = failure_count + 1, last_error = ?, updated_at = ?
                WHERE id = ?
                RETURNING failure_count
                "#,
            )
            .bind(error)
            .bind(now_ms())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(count)
        })
        .await?
        .ok_or_else(|| Error::not_found("Listing", id))?;
        Ok(count.max(0) as u32)
    }

    async fn touch_synced(&self, id: &str) -> Result<PlatformListing> {
        let updated = retry_on_busy("touch_listing_synced", || async {
            let now = now_ms();
            let row = sqlx::query_as::<_, PlatformListingDbModel>(
                r#"
                UPDATE platform_listings
                SET status = 'ACTIVE',
                    failure_count = 0,
                    last_error = NULL,
                    last_synced_at = ?,
                    updated_at = ?
                WHERE id = ? AND status IN ('ACTIVE', 'ERROR')
                RETURNING *
                "#,
            )
            .bind(now)
            .bind(now)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        })
        .await?;

        match updated {
            Some(row) => PlatformListing::try_from(row),
            None => Err(self.rejected_update(id, ListingStatus::Active).await),
        }
    }
}
