//! OAuth 2.0 token endpoint client and PKCE helpers.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::client::read_json;
use crate::error::MarketplaceError;

/// Token endpoint response shared by eBay and Etsy.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token_expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// How the client identifies itself to the token endpoint.
#[derive(Debug, Clone)]
pub enum ClientAuth {
    /// Confidential client: HTTP Basic with id and secret.
    Basic {
        client_id: String,
        client_secret: String,
    },
    /// Public client: `client_id` form field only, paired with PKCE.
    Public { client_id: String },
}

#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: Client,
    token_url: String,
    auth: ClientAuth,
}

impl OAuthClient {
    pub fn new(http: Client, token_url: impl Into<String>, auth: ClientAuth) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            auth,
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenResponse, MarketplaceError> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];
        if let Some(verifier) = code_verifier {
            form.push(("code_verifier", verifier));
        }
        self.post_form(form).await
    }

    pub async fn refresh(
        &self,
        refresh_token: &str,
        scope: Option<&str>,
    ) -> Result<TokenResponse, MarketplaceError> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        if let Some(scope) = scope {
            form.push(("scope", scope));
        }
        self.post_form(form).await
    }

    async fn post_form<'a>(
        &'a self,
        mut form: Vec<(&'a str, &'a str)>,
    ) -> Result<TokenResponse, MarketplaceError> {
        let mut request = self.http.post(&self.token_url);
        match &self.auth {
            ClientAuth::Basic {
                client_id,
                client_secret,
            } => {
                let credentials = STANDARD.encode(format!("{client_id}:{client_secret}"));
                request = request.header("Authorization", format!("Basic {credentials}"));
            }
            ClientAuth::Public { client_id } => form.push(("client_id", client_id.as_str())),
        }

        let grant_type = form
            .iter()
            .find(|(k, _)| *k == "grant_type")
            .map(|(_, v)| *v)
            .unwrap_or_default();
        debug!(token_url = %self.token_url, grant_type, "requesting oauth token");

        let response = request.form(&form).send().await?;
        read_json(response).await
    }
}

/// PKCE verifier/challenge pair (RFC 7636, S256).
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    pub fn generate() -> Self {
        let bytes = rand::random::<[u8; 32]>();
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = pkce_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Random URL-safe value for the OAuth `state` parameter.
pub fn random_state() -> String {
    URL_SAFE_NO_PAD.encode(rand::random::<[u8; 16]>())
}
