//! Product, image and auction database models.

use sqlx::FromRow;

use crate::database::time::decimal_from_db;
use crate::domain::{AuctionTerms, ListingType, ProductSnapshot, ProductStatus};
use crate::{Error, Result};

#[derive(Debug, Clone, FromRow)]
pub struct ProductDbModel {
    pub id: String,
    pub sku: String,
    pub title: String,
    pub description: String,
    pub price: Option<String>,
    pub quantity: i64,
    pub condition: Option<String>,
    pub listing_type: String,
    pub status: String,
    pub year: Option<i64>,
    pub mint: Option<String>,
    pub grade: Option<String>,
    pub certification: Option<String>,
    pub cert_number: Option<String>,
    pub metal_type: Option<String>,
    pub metal_weight: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct AuctionDbModel {
    pub id: String,
    pub product_id: String,
    pub start_price: Option<String>,
    pub reserve_price: Option<String>,
    pub buy_now_price: Option<String>,
    pub final_price: Option<String>,
    pub status: String,
    pub updated_at: i64,
}

impl AuctionDbModel {
    pub fn terms(&self) -> Result<AuctionTerms> {
        Ok(AuctionTerms {
            start_price: decimal_from_db("start_price", self.start_price.as_deref())?,
            reserve_price: decimal_from_db("reserve_price", self.reserve_price.as_deref())?,
            buy_now_price: decimal_from_db("buy_now_price", self.buy_now_price.as_deref())?,
        })
    }
}

impl ProductDbModel {
    /// Assembles the snapshot from the product row plus its images and auction.
    pub fn into_snapshot(
        self,
        image_urls: Vec<String>,
        auction: Option<&AuctionDbModel>,
    ) -> Result<ProductSnapshot> {
        let listing_type = ListingType::parse(&self.listing_type).ok_or_else(|| {
            Error::validation(format!("unknown listing type: {}", self.listing_type))
        })?;
        let status = ProductStatus::parse(&self.status)
            .ok_or_else(|| Error::validation(format!("unknown product status: {}", self.status)))?;

        Ok(ProductSnapshot {
            price: decimal_from_db("price", self.price.as_deref())?,
            metal_weight: decimal_from_db("metal_weight", self.metal_weight.as_deref())?,
            auction: auction.map(AuctionDbModel::terms).transpose()?,
            id: self.id,
            sku: self.sku,
            title: self.title,
            description: self.description,
            quantity: self.quantity,
            condition: self.condition,
            listing_type,
            status,
            year: self.year.and_then(|y| i32::try_from(y).ok()),
            mint: self.mint,
            grade: self.grade,
            certification: self.certification,
            cert_number: self.cert_number,
            metal_type: self.metal_type,
            image_urls,
        })
    }
}
