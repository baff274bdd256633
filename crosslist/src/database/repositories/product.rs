//! Product repository (SQLx): read snapshots, record sales.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use crate::database::models::{AuctionDbModel, ProductDbModel};
use crate::database::retry::retry_on_busy;
use crate::database::time::{decimal_to_db, now_ms};
use crate::domain::{ProductSnapshot, ProductStatus};
use crate::products::ProductStore;
use crate::{Error, Result};

pub struct SqlxProductStore {
    pool: SqlitePool,
}

impl SqlxProductStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a product with its images and optional auction terms.
    ///
    /// Products are owned by the catalogue; this exists for seeding and imports.
    pub async fn insert_product(&self, product: &ProductSnapshot) -> Result<()> {
        let now = now_ms();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products
                (id, sku, title, description, price, quantity, condition, listing_type, status,
                 year, mint, grade, certification, cert_number, metal_type, metal_weight,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.title)
        .bind(&product.description)
        .bind(decimal_to_db(product.price))
        .bind(product.quantity)
        .bind(&product.condition)
        .bind(product.listing_type.as_str())
        .bind(product.status.as_str())
        .bind(product.year.map(i64::from))
        .bind(&product.mint)
        .bind(&product.grade)
        .bind(&product.certification)
        .bind(&product.cert_number)
        .bind(&product.metal_type)
        .bind(decimal_to_db(product.metal_weight))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (position, url) in product.image_urls.iter().enumerate() {
            sqlx::query(
                "INSERT INTO product_images (id, product_id, url, position) VALUES (?, ?, ?, ?)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&product.id)
            .bind(url)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(terms) = &product.auction {
            sqlx::query(
                r#"
                INSERT INTO auctions
                    (id, product_id, start_price, reserve_price, buy_now_price, status, updated_at)
                VALUES (?, ?, ?, ?, ?, 'SCHEDULED', ?)
                "#,
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&product.id)
            .bind(decimal_to_db(terms.start_price))
            .bind(decimal_to_db(terms.reserve_price))
            .bind(decimal_to_db(terms.buy_now_price))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(product_id = %product.id, "Product inserted");
        Ok(())
    }

    /// Final price recorded on the product's auction, if any.
    pub async fn auction_final_price(&self, product_id: &str) -> Result<Option<Decimal>> {
        let row: Option<Option<String>> =
            sqlx::query_scalar("SELECT final_price FROM auctions WHERE product_id = ?")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;
        crate::database::time::decimal_from_db("final_price", row.flatten().as_deref())
    }
}

#[async_trait]
impl ProductStore for SqlxProductStore {
    async fn get_product(&self, product_id: &str) -> Result<ProductSnapshot> {
        let product =
            sqlx::query_as::<_, ProductDbModel>("SELECT * FROM products WHERE id = ?")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| Error::not_found("Product", product_id))?;

        let image_urls: Vec<String> = sqlx::query_scalar(
            "SELECT url FROM product_images WHERE product_id = ? ORDER BY position, id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        let auction = sqlx::query_as::<_, AuctionDbModel>(
            "SELECT * FROM auctions WHERE product_id = ?",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        product.into_snapshot(image_urls, auction.as_ref())
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn mark_sold(&self, product_id: &str, amount: Option<Decimal>) -> Result<bool> {
        let amount = decimal_to_db(amount);
        retry_on_busy("mark_product_sold", || async {
            let now = now_ms();
            let mut tx = self.pool.begin().await?;

            let updated = sqlx::query(
                "UPDATE products SET status = ?, updated_at = ? WHERE id = ? AND status != ?",
            )
            .bind(ProductStatus::Sold.as_str())
            .bind(now)
            .bind(product_id)
            .bind(ProductStatus::Sold.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if updated == 0 {
                let exists: Option<String> =
                    sqlx::query_scalar("SELECT id FROM products WHERE id = ?")
                        .bind(product_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                tx.rollback().await?;
                return match exists {
                    Some(_) => Ok(false),
                    None => Err(Error::not_found("Product", product_id)),
                };
            }

            sqlx::query(
                r#"
                UPDATE auctions
                SET status = 'SOLD', final_price = COALESCE(?, final_price), updated_at = ?
                WHERE product_id = ?
                "#,
            )
            .bind(&amount)
            .bind(now)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(true)
        })
        .await
    }
}
