//! eBay OAuth provider (confidential client, authorization code grant).

use async_trait::async_trait;
use marketplaces_api::ebay::{self, EbayEnvironment};
use marketplaces_api::oauth::{OAuthClient, TokenResponse};
use reqwest::Client;
use tracing::instrument;

use crate::credentials::error::TokenError;
use crate::credentials::provider::{AuthorizationRequest, TokenProvider};
use crate::domain::{Platform, PlatformConnection, TokenSet};

pub struct EbayTokenProvider {
    oauth: OAuthClient,
    env: EbayEnvironment,
    client_id: String,
    /// eBay calls this the RuName; it names the registered redirect, not a URL.
    redirect_uri: String,
}

impl EbayTokenProvider {
    pub fn new(
        http: Client,
        env: EbayEnvironment,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        let client_id = client_id.into();
        Self {
            oauth: ebay::oauth_client(http, env.token_url(), client_id.clone(), client_secret),
            env,
            client_id,
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Uses `oauth` as-is, e.g. pointed at a local token endpoint.
    pub fn with_oauth_client(
        oauth: OAuthClient,
        env: EbayEnvironment,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            oauth,
            env,
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
        }
    }
}

pub(super) fn token_set(response: TokenResponse) -> TokenSet {
    TokenSet::from_expires_in(
        response.access_token,
        response.refresh_token,
        response.expires_in,
    )
}

#[async_trait]
impl TokenProvider for EbayTokenProvider {
    fn platform(&self) -> Platform {
        Platform::Ebay
    }

    fn authorization_request(&self, state: &str) -> Result<AuthorizationRequest, TokenError> {
        let url = ebay::authorization_url(self.env, &self.client_id, &self.redirect_uri, state)
            .map_err(|e| TokenError::Transient(e.to_string()))?;
        Ok(AuthorizationRequest {
            url,
            state: state.to_string(),
            code_verifier: None,
        })
    }

    #[instrument(skip_all)]
    async fn exchange_code(
        &self,
        code: &str,
        _code_verifier: Option<&str>,
    ) -> Result<TokenSet, TokenError> {
        let response = self
            .oauth
            .exchange_code(code, &self.redirect_uri, None)
            .await
            .map_err(|e| TokenError::from_endpoint(Platform::Ebay, e))?;
        Ok(token_set(response))
    }

    #[instrument(skip_all)]
    async fn refresh(&self, connection: &PlatformConnection) -> Result<TokenSet, TokenError> {
        let refresh_token = connection
            .refresh_token
            .as_deref()
            .ok_or_else(|| TokenError::reauthorization(Platform::Ebay, "no refresh token stored"))?;
        let scope = ebay::SCOPES.join(" ");
        let response = self
            .oauth
            .refresh(refresh_token, Some(&scope))
            .await
            .map_err(|e| TokenError::from_endpoint(Platform::Ebay, e))?;
        Ok(token_set(response))
    }
}
