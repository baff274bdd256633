use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Accepts ids sent either as JSON strings or numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Int(n) => n.to_string(),
        Id::Float(f) => f.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Timed,
    Live,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewEvent {
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedEvent {
    #[serde(deserialize_with = "string_or_number")]
    pub auction_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewLot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lot_number: Option<String>,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    pub starting_bid: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserve_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy_now_price: Option<f64>,
    pub quantity: i64,
    pub images: Vec<String>,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedLot {
    #[serde(deserialize_with = "string_or_number")]
    pub lot_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
    Open,
    Active,
    Pending,
    Sold,
    Unsold,
    Passed,
    Withdrawn,
    Closed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LotResult {
    #[serde(deserialize_with = "string_or_number")]
    pub lot_id: String,
    pub status: LotStatus,
    #[serde(default)]
    pub winning_bid: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventResults {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub lots: Vec<LotResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryList {
    #[serde(default)]
    pub categories: Vec<Category>,
}
