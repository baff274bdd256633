//! Platform connection repository (SQLx).
//!
//! Database-backed implementation of the credential store.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use crate::credentials::CredentialStore;
use crate::database::models::PlatformConnectionDbModel;
use crate::database::retry::retry_on_busy;
use crate::database::time::now_ms;
use crate::domain::{Platform, PlatformConnection, TokenSet};
use crate::Result;

/// SQLx-backed credential store.
pub struct SqlxCredentialStore {
    pool: SqlitePool,
}

impl SqlxCredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for SqlxCredentialStore {
    async fn get(&self, platform: Platform) -> Result<Option<PlatformConnection>> {
        sqlx::query_as::<_, PlatformConnectionDbModel>(
            "SELECT * FROM platform_connections WHERE platform = ?",
        )
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(PlatformConnection::try_from)
        .transpose()
    }

    #[instrument(skip(self, tokens), fields(platform = %platform))]
    async fn upsert(&self, platform: Platform, tokens: &TokenSet) -> Result<PlatformConnection> {
        let model = PlatformConnectionDbModel::new(platform, tokens);
        let row = retry_on_busy("upsert_connection", || async {
            let row = sqlx::query_as::<_, PlatformConnectionDbModel>(
                r#"
                INSERT INTO platform_connections
                    (id, platform, access_token, refresh_token, expires_at, store_id, is_active, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)
                ON CONFLICT(platform) DO UPDATE SET
                    access_token = excluded.access_token,
                    refresh_token = excluded.refresh_token,
                    expires_at = excluded.expires_at,
                    store_id = COALESCE(excluded.store_id, platform_connections.store_id),
                    is_active = 1,
                    updated_at = excluded.updated_at
                RETURNING *
                "#,
            )
            .bind(&model.id)
            .bind(&model.platform)
            .bind(&model.access_token)
            .bind(&model.refresh_token)
            .bind(model.expires_at)
            .bind(&model.store_id)
            .bind(model.created_at)
            .bind(model.updated_at)
            .fetch_one(&self.pool)
            .await?;
            Ok(row)
        })
        .await?;

        debug!(connection_id = %row.id, "Connection upserted");
        PlatformConnection::try_from(row)
    }

    async fn deactivate(&self, platform: Platform) -> Result<()> {
        retry_on_busy("deactivate_connection", || async {
            sqlx::query(
                "UPDATE platform_connections SET is_active = 0, updated_at = ? WHERE platform = ?",
            )
            .bind(now_ms())
            .bind(platform.as_str())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn list_active(&self) -> Result<Vec<PlatformConnection>> {
        let rows = sqlx::query_as::<_, PlatformConnectionDbModel>(
            "SELECT * FROM platform_connections WHERE is_active = 1 ORDER BY platform",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PlatformConnection::try_from).collect()
    }

    async fn list_all(&self) -> Result<Vec<PlatformConnection>> {
        let rows = sqlx::query_as::<_, PlatformConnectionDbModel>(
            "SELECT * FROM platform_connections ORDER BY platform",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PlatformConnection::try_from).collect()
    }
}
