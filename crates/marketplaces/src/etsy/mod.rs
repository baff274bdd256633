//! Etsy Open API v3 client.

pub mod models;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use tracing::debug;
use url::Url;

use crate::client::{check_response, join, read_json};
use crate::error::MarketplaceError;
use crate::oauth::{ClientAuth, OAuthClient};

pub use models::*;

pub const API_BASE: &str = "https://openapi.etsy.com/v3";
pub const TOKEN_URL: &str = "https://api.etsy.com/v3/public/oauth/token";
pub const CONNECT_URL: &str = "https://www.etsy.com/oauth/connect";

pub const SCOPES: &[&str] = &[
    "listings_r",
    "listings_w",
    "listings_d",
    "shops_r",
    "shops_w",
    "transactions_r",
];

pub fn listing_url(listing_id: &str) -> String {
    format!("https://www.etsy.com/listing/{listing_id}")
}

/// Consent URL for the PKCE flow. `code_challenge` is the S256 challenge of the verifier.
pub fn authorization_url(
    client_id: &str,
    redirect_uri: &str,
    state: &str,
    code_challenge: &str,
) -> Result<String, MarketplaceError> {
    let scope = SCOPES.join(" ");
    let url = Url::parse_with_params(
        CONNECT_URL,
        &[
            ("response_type", "code"),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("scope", scope.as_str()),
            ("state", state),
            ("code_challenge", code_challenge),
            ("code_challenge_method", "S256"),
        ],
    )
    .map_err(|e| MarketplaceError::InvalidUrl(e.to_string()))?;
    Ok(url.to_string())
}

pub fn oauth_client(
    http: Client,
    token_url: impl Into<String>,
    client_id: impl Into<String>,
) -> OAuthClient {
    OAuthClient::new(
        http,
        token_url,
        ClientAuth::Public {
            client_id: client_id.into(),
        },
    )
}

#[derive(Debug, Clone)]
pub struct EtsyClient {
    http: Client,
    api_base: String,
    api_key: String,
}

impl EtsyClient {
    pub fn new(http: Client, api_key: impl Into<String>) -> Self {
        Self::with_base_url(http, API_BASE, api_key)
    }

    pub fn with_base_url(http: Client, api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }

    fn request(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.http
            .request(method, join(&self.api_base, path))
            .bearer_auth(token)
            .header("x-api-key", &self.api_key)
    }

    /// The authenticated user and their shop, if any.
    pub async fn get_me(&self, token: &str) -> Result<Me, MarketplaceError> {
        let response = self
            .request(Method::GET, "/application/users/me", token)
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn shipping_profiles(
        &self,
        token: &str,
        shop_id: &str,
    ) -> Result<Vec<ShippingProfile>, MarketplaceError> {
        let path = format!("/application/shops/{shop_id}/shipping-profiles");
        let response = self.request(Method::GET, &path, token).send().await?;
        let page: Paged<ShippingProfile> = read_json(response).await?;
        Ok(page.results)
    }

    /// Creates the listing in `draft` state.
    pub async fn create_draft_listing(
        &self,
        token: &str,
        shop_id: &str,
        listing: &NewListing,
    ) -> Result<Listing, MarketplaceError> {
        let path = format!("/application/shops/{shop_id}/listings");
        debug!(shop_id, title = %listing.title, "creating Etsy draft listing");
        let response = self
            .request(Method::POST, &path, token)
            .json(listing)
            .send()
            .await?;
        read_json(response).await
    }

    /// Downloads `image_url` and attaches it to the listing at `rank` (1-based).
    pub async fn upload_image_from_url(
        &self,
        token: &str,
        shop_id: &str,
        listing_id: &str,
        image_url: &str,
        rank: usize,
    ) -> Result<ListingImage, MarketplaceError> {
        let image = check_response(self.http.get(image_url).send().await?).await?;
        let content_type = image
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = image.bytes().await?;

        let part = Part::bytes(bytes.to_vec())
            .file_name(format!("image-{rank}.jpg"))
            .mime_str(&content_type)?;
        let form = Form::new().part("image", part).text("rank", rank.to_string());

        let path = format!("/application/shops/{shop_id}/listings/{listing_id}/images");
        debug!(listing_id, rank, "uploading Etsy listing image");
        let response = self
            .request(Method::POST, &path, token)
            .multipart(form)
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn update_listing_state(
        &self,
        token: &str,
        shop_id: &str,
        listing_id: &str,
        state: &str,
    ) -> Result<Listing, MarketplaceError> {
        let path = format!("/application/shops/{shop_id}/listings/{listing_id}");
        debug!(listing_id, state, "updating Etsy listing state");
        let response = self
            .request(Method::PATCH, &path, token)
            .json(&StateUpdate { state })
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn get_listing(&self, token: &str, listing_id: &str) -> Result<Listing, MarketplaceError> {
        let path = format!("/application/listings/{listing_id}");
        let response = self.request(Method::GET, &path, token).send().await?;
        read_json(response).await
    }

    pub async fn delete_listing(&self, token: &str, listing_id: &str) -> Result<(), MarketplaceError> {
        let path = format!("/application/listings/{listing_id}");
        debug!(listing_id, "deleting Etsy listing");
        let response = self.request(Method::DELETE, &path, token).send().await?;
        check_response(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_url_uses_pkce() {
        let url = authorization_url("key", "https://shop.example/callback", "st", "chal").unwrap();
        assert!(url.starts_with(CONNECT_URL));
        assert!(url.contains("code_challenge=chal"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("listings_w"));
    }

    #[test]
    fn test_listing_url() {
        assert_eq!(listing_url("987"), "https://www.etsy.com/listing/987");
    }
}
