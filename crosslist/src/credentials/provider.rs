//! Per-platform token endpoint integration.

use async_trait::async_trait;

use super::error::TokenError;
use crate::domain::{Platform, PlatformConnection, TokenSet};

/// Where to send the operator to grant access, plus the PKCE verifier to keep
/// until the callback arrives.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: Option<String>,
}

/// Platform-specific side of the token lifecycle.
///
/// Providers only talk to the platform; persistence, locking and failure
/// bookkeeping stay in [`super::TokenManager`].
#[async_trait]
pub trait TokenProvider: Send + Sync {
    fn platform(&self) -> Platform;

    /// Whether expired grants can be renewed without the operator.
    fn supports_refresh(&self) -> bool {
        true
    }

    fn authorization_request(&self, state: &str) -> Result<AuthorizationRequest, TokenError> {
        let _ = state;
        Err(TokenError::Unsupported(format!(
            "{} does not use an OAuth consent flow",
            self.platform().display_name()
        )))
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenSet, TokenError> {
        let _ = (code, code_verifier);
        Err(TokenError::Unsupported(format!(
            "{} does not use an OAuth consent flow",
            self.platform().display_name()
        )))
    }

    /// Exchanges the connection's refresh token for a new grant.
    async fn refresh(&self, connection: &PlatformConnection) -> Result<TokenSet, TokenError>;

    /// Checks directly supplied credentials (API keys) before they are stored.
    async fn validate(&self, tokens: &TokenSet) -> Result<bool, TokenError> {
        let _ = tokens;
        Ok(true)
    }
}
