//! eBay Sell Inventory API client.
//!
//! Publishing is a three step sequence: upsert the inventory item keyed by SKU,
//! create an offer for it, then publish the offer which yields the public listing id.

pub mod models;

use reqwest::{Client, RequestBuilder};
use tracing::debug;
use url::Url;

use crate::client::{check_response, join, read_json};
use crate::error::MarketplaceError;
use crate::oauth::{ClientAuth, OAuthClient};

pub use models::*;

pub const SCOPES: &[&str] = &[
    "https://api.ebay.com/oauth/api_scope",
    "https://api.ebay.com/oauth/api_scope/sell.inventory",
    "https://api.ebay.com/oauth/api_scope/sell.marketing",
    "https://api.ebay.com/oauth/api_scope/sell.account",
    "https://api.ebay.com/oauth/api_scope/sell.fulfillment",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EbayEnvironment {
    #[default]
    Production,
    Sandbox,
}

impl EbayEnvironment {
    pub fn from_sandbox_flag(sandbox: bool) -> Self {
        if sandbox { Self::Sandbox } else { Self::Production }
    }

    pub fn api_base(&self) -> &'static str {
        match self {
            Self::Production => "https://api.ebay.com",
            Self::Sandbox => "https://api.sandbox.ebay.com",
        }
    }

    pub fn auth_base(&self) -> &'static str {
        match self {
            Self::Production => "https://auth.ebay.com",
            Self::Sandbox => "https://auth.sandbox.ebay.com",
        }
    }

    pub fn token_url(&self) -> String {
        join(self.api_base(), "/identity/v1/oauth2/token")
    }

    pub fn item_url(&self, listing_id: &str) -> String {
        match self {
            Self::Production => format!("https://www.ebay.com/itm/{listing_id}"),
            Self::Sandbox => format!("https://sandbox.ebay.com/itm/{listing_id}"),
        }
    }
}

/// Consent page the seller is redirected to when linking an account.
pub fn authorization_url(
    env: EbayEnvironment,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
) -> Result<String, MarketplaceError> {
    let base = join(env.auth_base(), "/oauth2/authorize");
    let scope = SCOPES.join(" ");
    let url = Url::parse_with_params(
        &base,
        &[
            ("client_id", client_id),
            ("response_type", "code"),
            ("redirect_uri", redirect_uri),
            ("scope", scope.as_str()),
            ("state", state),
        ],
    )
    .map_err(|e| MarketplaceError::InvalidUrl(e.to_string()))?;
    Ok(url.to_string())
}

pub fn oauth_client(
    http: Client,
    token_url: impl Into<String>,
    client_id: impl Into<String>,
    client_secret: impl Into<String>,
) -> OAuthClient {
    OAuthClient::new(
        http,
        token_url,
        ClientAuth::Basic {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        },
    )
}

#[derive(Debug, Clone)]
pub struct EbayClient {
    http: Client,
    api_base: String,
    content_language: String,
}

impl EbayClient {
    pub fn new(http: Client, env: EbayEnvironment) -> Self {
        Self::with_base_url(http, env.api_base())
    }

    /// Points the client at an arbitrary host, used for tests and proxies.
    pub fn with_base_url(http: Client, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            content_language: "en-US".to_string(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str, token: &str) -> RequestBuilder {
        self.http
            .request(method, join(&self.api_base, path))
            .bearer_auth(token)
            .header("Content-Language", &self.content_language)
            .header("Accept-Language", &self.content_language)
    }

    /// Creates or replaces the inventory item for `sku`. Idempotent.
    pub async fn put_inventory_item(
        &self,
        token: &str,
        sku: &str,
        item: &InventoryItem,
    ) -> Result<(), MarketplaceError> {
        let path = format!(
            "/sell/inventory/v1/inventory_item/{}",
            urlencoding::encode(sku)
        );
        debug!(sku, "upserting eBay inventory item");
        let response = self
            .request(reqwest::Method::PUT, &path, token)
            .json(item)
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }

    pub async fn create_offer(
        &self,
        token: &str,
        offer: &OfferRequest,
    ) -> Result<String, MarketplaceError> {
        debug!(sku = %offer.sku, "creating eBay offer");
        let response = self
            .request(reqwest::Method::POST, "/sell/inventory/v1/offer", token)
            .json(offer)
            .send()
            .await?;
        let created: CreateOfferResponse = read_json(response).await?;
        Ok(created.offer_id)
    }

    /// Replaces an unpublished offer's terms. Idempotent.
    pub async fn update_offer(
        &self,
        token: &str,
        offer_id: &str,
        offer: &OfferRequest,
    ) -> Result<(), MarketplaceError> {
        let path = format!("/sell/inventory/v1/offer/{}", urlencoding::encode(offer_id));
        debug!(offer_id, "updating eBay offer");
        let response = self
            .request(reqwest::Method::PUT, &path, token)
            .json(offer)
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }

    /// Offers already attached to `sku`. eBay answers 404 when there are none.
    pub async fn find_offers(
        &self,
        token: &str,
        sku: &str,
        marketplace_id: &str,
    ) -> Result<Vec<Offer>, MarketplaceError> {
        let response = self
            .request(reqwest::Method::GET, "/sell/inventory/v1/offer", token)
            .query(&[("sku", sku), ("marketplace_id", marketplace_id)])
            .send()
            .await?;
        match read_json::<OfferList>(response).await {
            Ok(list) => Ok(list.offers),
            Err(MarketplaceError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    pub async fn get_offer(&self, token: &str, offer_id: &str) -> Result<Offer, MarketplaceError> {
        let path = format!("/sell/inventory/v1/offer/{}", urlencoding::encode(offer_id));
        let response = self
            .request(reqwest::Method::GET, &path, token)
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn publish_offer(
        &self,
        token: &str,
        offer_id: &str,
    ) -> Result<String, MarketplaceError> {
        let path = format!(
            "/sell/inventory/v1/offer/{}/publish",
            urlencoding::encode(offer_id)
        );
        debug!(offer_id, "publishing eBay offer");
        let response = self
            .request(reqwest::Method::POST, &path, token)
            .send()
            .await?;
        let published: PublishResponse = read_json(response).await?;
        Ok(published.listing_id)
    }

    /// Ends the live listing behind `offer_id`; the offer itself is kept.
    pub async fn withdraw_offer(&self, token: &str, offer_id: &str) -> Result<(), MarketplaceError> {
        let path = format!(
            "/sell/inventory/v1/offer/{}/withdraw",
            urlencoding::encode(offer_id)
        );
        debug!(offer_id, "withdrawing eBay offer");
        let response = self
            .request(reqwest::Method::POST, &path, token)
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_url_contains_scopes() {
        let url = authorization_url(
            EbayEnvironment::Sandbox,
            "client-1",
            "Shop-RuName",
            "xyz",
        )
        .unwrap();
        assert!(url.starts_with("https://auth.sandbox.ebay.com/oauth2/authorize?"));
        assert!(url.contains("client_id=client-1"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("sell.inventory"));
        assert!(url.contains("state=xyz"));
    }

    #[test]
    fn test_environment_urls() {
        assert_eq!(
            EbayEnvironment::Production.token_url(),
            "https://api.ebay.com/identity/v1/oauth2/token"
        );
        assert_eq!(
            EbayEnvironment::Production.item_url("123"),
            "https://www.ebay.com/itm/123"
        );
        assert_eq!(
            EbayEnvironment::from_sandbox_flag(true),
            EbayEnvironment::Sandbox
        );
    }
}
