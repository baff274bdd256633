//! AuctionFlex360 static API key "provider".
//!
//! Keys never expire, so there is nothing to refresh; linking only validates.

use async_trait::async_trait;
use marketplaces_api::auctionflex::{AuctionFlexClient, AuctionFlexCredentials};
use tracing::instrument;

use crate::credentials::error::TokenError;
use crate::credentials::provider::TokenProvider;
use crate::domain::{Platform, PlatformConnection, TokenSet};

pub struct AuctionFlexKeyProvider {
    client: AuctionFlexClient,
}

impl AuctionFlexKeyProvider {
    pub fn new(client: AuctionFlexClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenProvider for AuctionFlexKeyProvider {
    fn platform(&self) -> Platform {
        Platform::AuctionFlex
    }

    fn supports_refresh(&self) -> bool {
        false
    }

    async fn refresh(&self, _connection: &PlatformConnection) -> Result<TokenSet, TokenError> {
        Err(TokenError::reauthorization(
            Platform::AuctionFlex,
            "API keys cannot be refreshed",
        ))
    }

    #[instrument(skip_all)]
    async fn validate(&self, tokens: &TokenSet) -> Result<bool, TokenError> {
        let Some(company_id) = tokens.store_id.clone() else {
            return Ok(false);
        };
        let creds = AuctionFlexCredentials {
            api_key: tokens.access_token.clone(),
            company_id,
        };
        self.client
            .validate(&creds)
            .await
            .map_err(|e| TokenError::from_endpoint(Platform::AuctionFlex, e))
    }
}
