//! Boundary to the canonical product and auction store.
//!
//! The engine only reads product snapshots and flips a product to `SOLD`.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::Result;
use crate::domain::ProductSnapshot;

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Snapshot with images and auction terms attached.
    async fn get_product(&self, product_id: &str) -> Result<ProductSnapshot>;

    /// Marks the product `SOLD` and records the auction final price.
    ///
    /// Returns `false` when the product was already sold; the first sale wins.
    async fn mark_sold(&self, product_id: &str, amount: Option<Decimal>) -> Result<bool>;
}
