//! Etsy OAuth provider (public client with PKCE).

use async_trait::async_trait;
use marketplaces_api::etsy::{self, EtsyClient};
use marketplaces_api::oauth::{OAuthClient, PkcePair};
use reqwest::Client;
use tracing::{instrument, warn};

use super::ebay::token_set;
use crate::credentials::error::TokenError;
use crate::credentials::provider::{AuthorizationRequest, TokenProvider};
use crate::domain::{Platform, PlatformConnection, TokenSet};

pub struct EtsyTokenProvider {
    oauth: OAuthClient,
    api: EtsyClient,
    client_id: String,
    redirect_uri: String,
    /// Operator-supplied shop id; discovered from the account when absent.
    shop_id: Option<String>,
}

impl EtsyTokenProvider {
    pub fn new(
        http: Client,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        shop_id: Option<String>,
    ) -> Self {
        let client_id = client_id.into();
        Self {
            oauth: etsy::oauth_client(http.clone(), etsy::TOKEN_URL, client_id.clone()),
            api: EtsyClient::new(http, client_id.clone()),
            client_id,
            redirect_uri: redirect_uri.into(),
            shop_id,
        }
    }

    pub fn with_clients(
        oauth: OAuthClient,
        api: EtsyClient,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        shop_id: Option<String>,
    ) -> Self {
        Self {
            oauth,
            api,
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            shop_id,
        }
    }

    async fn resolve_shop_id(&self, access_token: &str) -> Option<String> {
        if let Some(shop_id) = &self.shop_id {
            return Some(shop_id.clone());
        }
        match self.api.get_me(access_token).await {
            Ok(me) => me.shop_id.map(|id| id.to_string()),
            Err(e) => {
                warn!(error = %e, "Could not look up Etsy shop id");
                None
            }
        }
    }
}

#[async_trait]
impl TokenProvider for EtsyTokenProvider {
    fn platform(&self) -> Platform {
        Platform::Etsy
    }

    fn authorization_request(&self, state: &str) -> Result<AuthorizationRequest, TokenError> {
        let pkce = PkcePair::generate();
        let url = etsy::authorization_url(&self.client_id, &self.redirect_uri, state, &pkce.challenge)
            .map_err(|e| TokenError::Transient(e.to_string()))?;
        Ok(AuthorizationRequest {
            url,
            state: state.to_string(),
            code_verifier: Some(pkce.verifier),
        })
    }

    #[instrument(skip_all)]
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenSet, TokenError> {
        let verifier = code_verifier.ok_or(TokenError::InvalidState)?;
        let response = self
            .oauth
            .exchange_code(code, &self.redirect_uri, Some(verifier))
            .await
            .map_err(|e| TokenError::from_endpoint(Platform::Etsy, e))?;
        let mut tokens = token_set(response);
        tokens.store_id = self.resolve_shop_id(&tokens.access_token).await;
        Ok(tokens)
    }

    #[instrument(skip_all)]
    async fn refresh(&self, connection: &PlatformConnection) -> Result<TokenSet, TokenError> {
        let refresh_token = connection
            .refresh_token
            .as_deref()
            .ok_or_else(|| TokenError::reauthorization(Platform::Etsy, "no refresh token stored"))?;
        let response = self
            .oauth
            .refresh(refresh_token, None)
            .await
            .map_err(|e| TokenError::from_endpoint(Platform::Etsy, e))?;
        let mut tokens = token_set(response);
        if connection.store_id.is_none() {
            tokens.store_id = self.resolve_shop_id(&tokens.access_token).await;
        }
        Ok(tokens)
    }
}
