//! AuctionFlex360 house auction API client.
//!
//! Authentication is a static API key sent as a bearer token together with the
//! `X-Company-Id` header. Items are sold as lots inside auction events.

pub mod models;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder};
use tracing::debug;

use crate::client::{check_response, join, read_json};
use crate::error::MarketplaceError;

pub use models::*;

pub const DEFAULT_API_URL: &str = "https://api.auctionflex.com";

#[derive(Debug, Clone)]
pub struct AuctionFlexCredentials {
    pub api_key: String,
    pub company_id: String,
}

#[derive(Debug, Clone)]
pub struct AuctionFlexClient {
    http: Client,
    api_url: String,
}

impl AuctionFlexClient {
    pub fn new(http: Client, api_url: impl Into<String>) -> Self {
        Self {
            http,
            api_url: api_url.into(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn lot_url(&self, event_id: &str, lot_id: &str) -> String {
        join(&self.api_url, &format!("/auctions/{event_id}/lots/{lot_id}"))
    }

    fn request(&self, method: Method, path: &str, creds: &AuctionFlexCredentials) -> RequestBuilder {
        self.http
            .request(method, join(&self.api_url, path))
            .bearer_auth(&creds.api_key)
            .header("X-Company-Id", &creds.company_id)
    }

    /// Creates a timed event in draft state and returns its id.
    pub async fn create_event(
        &self,
        creds: &AuctionFlexCredentials,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<String, MarketplaceError> {
        let event = NewEvent {
            name: name.to_string(),
            start_date: start.to_rfc3339(),
            end_date: end.to_rfc3339(),
            event_type: EventType::Timed,
            status: "draft".to_string(),
        };
        debug!(name, "creating AuctionFlex event");
        let response = self
            .request(Method::POST, "/v1/auctions", creds)
            .json(&event)
            .send()
            .await?;
        let created: CreatedEvent = read_json(response).await?;
        Ok(created.auction_id)
    }

    pub async fn add_lot(
        &self,
        creds: &AuctionFlexCredentials,
        event_id: &str,
        lot: &NewLot,
    ) -> Result<String, MarketplaceError> {
        let path = format!("/v1/auctions/{event_id}/lots");
        debug!(event_id, title = %lot.title, "adding AuctionFlex lot");
        let response = self
            .request(Method::POST, &path, creds)
            .json(lot)
            .send()
            .await?;
        let created: CreatedLot = read_json(response).await?;
        Ok(created.lot_id)
    }

    pub async fn publish_event(
        &self,
        creds: &AuctionFlexCredentials,
        event_id: &str,
    ) -> Result<(), MarketplaceError> {
        let path = format!("/v1/auctions/{event_id}/publish");
        debug!(event_id, "publishing AuctionFlex event");
        let response = self.request(Method::POST, &path, creds).send().await?;
        check_response(response).await?;
        Ok(())
    }

    pub async fn event_results(
        &self,
        creds: &AuctionFlexCredentials,
        event_id: &str,
    ) -> Result<EventResults, MarketplaceError> {
        let path = format!("/v1/auctions/{event_id}/results");
        let response = self.request(Method::GET, &path, creds).send().await?;
        read_json(response).await
    }

    pub async fn get_lot(
        &self,
        creds: &AuctionFlexCredentials,
        lot_id: &str,
    ) -> Result<LotResult, MarketplaceError> {
        let path = format!("/v1/lots/{lot_id}");
        let response = self.request(Method::GET, &path, creds).send().await?;
        read_json(response).await
    }

    pub async fn remove_lot(
        &self,
        creds: &AuctionFlexCredentials,
        lot_id: &str,
    ) -> Result<(), MarketplaceError> {
        let path = format!("/v1/lots/{lot_id}");
        debug!(lot_id, "removing AuctionFlex lot");
        let response = self.request(Method::DELETE, &path, creds).send().await?;
        check_response(response).await?;
        Ok(())
    }

    pub async fn categories(
        &self,
        creds: &AuctionFlexCredentials,
    ) -> Result<Vec<Category>, MarketplaceError> {
        let response = self.request(Method::GET, "/v1/categories", creds).send().await?;
        let list: CategoryList = read_json(response).await?;
        Ok(list.categories)
    }

    /// Probes `/v1/account`; `Ok(false)` means the key or company id was refused.
    pub async fn validate(&self, creds: &AuctionFlexCredentials) -> Result<bool, MarketplaceError> {
        let response = self.request(Method::GET, "/v1/account", creds).send().await?;
        match check_response(response).await {
            Ok(_) => Ok(true),
            Err(MarketplaceError::Unauthorized { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
