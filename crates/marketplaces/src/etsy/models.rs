use serde::{Deserialize, Serialize};

pub const TITLE_MAX_CHARS: usize = 140;
pub const MAX_IMAGES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub quantity: i64,
    pub taxonomy_id: i64,
    pub who_made: String,
    pub when_made: String,
    pub is_supply: bool,
    pub should_auto_renew: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_profile_id: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingState {
    Active,
    Inactive,
    SoldOut,
    Draft,
    Expired,
    Removed,
    Edit,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Money {
    pub amount: i64,
    pub divisor: i64,
    #[serde(default)]
    pub currency_code: Option<String>,
}

impl Money {
    /// Amount as a decimal string, e.g. `28500 / 100` becomes `"285.00"`.
    pub fn to_decimal_string(&self) -> String {
        if self.divisor <= 1 {
            return self.amount.to_string();
        }
        let scale = self.divisor.to_string().len() - 1;
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        let div = self.divisor as u64;
        format!("{sign}{}.{:0scale$}", abs / div, abs % div, scale = scale)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Listing {
    pub listing_id: u64,
    pub state: ListingState,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub price: Option<Money>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingProfile {
    pub shipping_profile_id: i64,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paged<T> {
    #[serde(default)]
    pub count: Option<i64>,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingImage {
    pub listing_image_id: u64,
}

/// `GET /application/users/me`; `shop_id` is absent for accounts without a shop.
#[derive(Debug, Clone, Deserialize)]
pub struct Me {
    pub user_id: u64,
    #[serde(default)]
    pub shop_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateUpdate<'a> {
    pub state: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_to_decimal_string() {
        let money = Money {
            amount: 28500,
            divisor: 100,
            currency_code: Some("USD".into()),
        };
        assert_eq!(money.to_decimal_string(), "285.00");

        let cents = Money {
            amount: 5,
            divisor: 100,
            currency_code: None,
        };
        assert_eq!(cents.to_decimal_string(), "0.05");
    }

    #[test]
    fn test_listing_state_tolerates_unknown_values() {
        let listing: Listing =
            serde_json::from_str(r#"{"listing_id": 42, "state": "something_new"}"#).unwrap();
        assert_eq!(listing.state, ListingState::Unknown);

        let listing: Listing =
            serde_json::from_str(r#"{"listing_id": 42, "state": "sold_out"}"#).unwrap();
        assert_eq!(listing.state, ListingState::SoldOut);
    }
}
