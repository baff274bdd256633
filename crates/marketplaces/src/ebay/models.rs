use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub availability: Availability,
    pub condition: String,
    pub product: InventoryProduct,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub ship_to_location_availability: ShipToLocationAvailability,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipToLocationAvailability {
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryProduct {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    /// Item specifics, e.g. `"Grade": ["MS70"]`.
    #[serde(default)]
    pub aspects: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingFormat {
    Auction,
    FixedPrice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub value: String,
    pub currency: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPolicies {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillment_policy_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_policy_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_policy_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auction_start_price: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auction_reserve_price: Option<Amount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRequest {
    pub sku: String,
    pub marketplace_id: String,
    pub format: ListingFormat,
    pub available_quantity: i64,
    pub category_id: String,
    pub listing_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_duration: Option<String>,
    pub listing_policies: ListingPolicies,
    pub pricing_summary: PricingSummary,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfferResponse {
    pub offer_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub listing_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub offer_id: String,
    #[serde(default)]
    pub sku: Option<String>,
    /// `PUBLISHED` or `UNPUBLISHED`.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub available_quantity: Option<i64>,
    #[serde(default)]
    pub pricing_summary: Option<PricingSummary>,
    #[serde(default)]
    pub listing: Option<OfferListing>,
}

impl Offer {
    pub fn is_published(&self) -> bool {
        self.status.as_deref() == Some("PUBLISHED")
    }

    pub fn listing_id(&self) -> Option<&str> {
        self.listing.as_ref().and_then(|l| l.listing_id.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferListing {
    #[serde(default)]
    pub listing_id: Option<String>,
    /// `ACTIVE`, `OUT_OF_STOCK`, `ENDED`, `INACTIVE`, ...
    #[serde(default)]
    pub listing_status: Option<String>,
    #[serde(default)]
    pub sold_quantity: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfferList {
    #[serde(default)]
    pub offers: Vec<Offer>,
    #[serde(default)]
    pub total: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_request_serialization() {
        let offer = OfferRequest {
            sku: "SKU-1".into(),
            marketplace_id: "EBAY_US".into(),
            format: ListingFormat::FixedPrice,
            available_quantity: 1,
            category_id: "11116".into(),
            listing_description: "desc".into(),
            listing_duration: None,
            listing_policies: ListingPolicies {
                payment_policy_id: Some("pay".into()),
                ..Default::default()
            },
            pricing_summary: PricingSummary {
                price: Some(Amount {
                    value: "285.00".into(),
                    currency: "USD".into(),
                }),
                auction_start_price: None,
                auction_reserve_price: None,
            },
        };

        let json = serde_json::to_value(&offer).unwrap();
        assert_eq!(json["format"], "FIXED_PRICE");
        assert_eq!(json["marketplaceId"], "EBAY_US");
        assert_eq!(json["pricingSummary"]["price"]["value"], "285.00");
        assert_eq!(json["listingPolicies"]["paymentPolicyId"], "pay");
        assert!(json["listingPolicies"].get("returnPolicyId").is_none());
        assert!(json.get("listingDuration").is_none());
    }

    #[test]
    fn test_offer_deserialization() {
        let json = r#"{
            "offerId": "9000123",
            "sku": "SKU-1",
            "status": "PUBLISHED",
            "listing": {"listingId": "1100223344", "listingStatus": "OUT_OF_STOCK", "soldQuantity": 1}
        }"#;
        let offer: Offer = serde_json::from_str(json).unwrap();
        assert!(offer.is_published());
        assert_eq!(offer.listing_id(), Some("1100223344"));
        assert_eq!(offer.listing.unwrap().sold_quantity, Some(1));
    }
}
