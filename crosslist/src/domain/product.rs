use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingType {
    FixedPrice,
    Auction,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixedPrice => "FIXED_PRICE",
            Self::Auction => "AUCTION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "FIXED_PRICE" => Some(Self::FixedPrice),
            "AUCTION" => Some(Self::Auction),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    Draft,
    Active,
    Pending,
    Sold,
    Archived,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Active => "ACTIVE",
            Self::Pending => "PENDING",
            Self::Sold => "SOLD",
            Self::Archived => "ARCHIVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(Self::Draft),
            "ACTIVE" => Some(Self::Active),
            "PENDING" => Some(Self::Pending),
            "SOLD" => Some(Self::Sold),
            "ARCHIVED" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Auction-specific pricing attached to a product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionTerms {
    pub start_price: Option<Decimal>,
    pub reserve_price: Option<Decimal>,
    pub buy_now_price: Option<Decimal>,
}

/// Read-only view of an inventory item, as handed to the platform adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub id: String,
    pub sku: String,
    pub title: String,
    pub description: String,
    pub price: Option<Decimal>,
    pub quantity: i64,
    pub condition: Option<String>,
    pub listing_type: ListingType,
    pub status: ProductStatus,
    pub year: Option<i32>,
    pub mint: Option<String>,
    pub grade: Option<String>,
    pub certification: Option<String>,
    pub cert_number: Option<String>,
    pub metal_type: Option<String>,
    /// Troy ounces.
    pub metal_weight: Option<Decimal>,
    pub image_urls: Vec<String>,
    pub auction: Option<AuctionTerms>,
}

impl ProductSnapshot {
    /// Minimal fixed-price snapshot; the remaining fields are filled in by callers.
    pub fn new(id: impl Into<String>, sku: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sku: sku.into(),
            title: title.into(),
            description: String::new(),
            price: None,
            quantity: 1,
            condition: None,
            listing_type: ListingType::FixedPrice,
            status: ProductStatus::Active,
            year: None,
            mint: None,
            grade: None,
            certification: None,
            cert_number: None,
            metal_type: None,
            metal_weight: None,
            image_urls: Vec::new(),
            auction: None,
        }
    }

    pub fn is_sold(&self) -> bool {
        self.status == ProductStatus::Sold
    }

    pub fn auction_terms(&self) -> Option<&AuctionTerms> {
        self.auction.as_ref()
    }
}
