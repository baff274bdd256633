//! Shared HTTP plumbing for the marketplace clients.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::MarketplaceError;

pub const DEFAULT_UA: &str = concat!("crosslist-marketplaces/", env!("CARGO_PKG_VERSION"));

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY: usize = 512;

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Builder with the user agent and timeouts every marketplace client uses.
pub fn client_builder(timeout: Option<Duration>) -> reqwest::ClientBuilder {
    install_rustls_provider();
    Client::builder()
        .user_agent(DEFAULT_UA)
        .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
}

pub fn build_client(timeout: Option<Duration>) -> Result<Client, MarketplaceError> {
    Ok(client_builder(timeout).build()?)
}

/// Maps a non-success response onto the error taxonomy, passing successes through.
pub async fn check_response(response: Response) -> Result<Response, MarketplaceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = parse_retry_after(response.headers());
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    let message = truncate(&body);
    debug!(%url, status = status.as_u16(), body = %message, "marketplace request failed");

    Err(classify(status, message, retry_after))
}

pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, MarketplaceError> {
    let response = check_response(response).await?;
    let body = response.text().await?;
    trace!(body = %truncate(&body), "marketplace response");
    serde_json::from_str(&body).map_err(MarketplaceError::from)
}

fn classify(status: StatusCode, message: String, retry_after: Option<Duration>) -> MarketplaceError {
    let code = status.as_u16();
    match status {
        StatusCode::TOO_MANY_REQUESTS => MarketplaceError::RateLimited { retry_after },
        StatusCode::NOT_FOUND | StatusCode::GONE => MarketplaceError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => MarketplaceError::Unauthorized {
            status: code,
            message,
        },
        s if s.is_server_error() => MarketplaceError::Server {
            status: code,
            message,
        },
        _ => MarketplaceError::Rejected {
            status: code,
            message,
        },
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Joins a base URL and a path without doubling slashes.
pub(crate) fn join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_statuses() {
        assert!(matches!(
            classify(StatusCode::TOO_MANY_REQUESTS, String::new(), Some(Duration::from_secs(3))),
            MarketplaceError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(3)
        ));
        assert!(matches!(
            classify(StatusCode::NOT_FOUND, "gone".into(), None),
            MarketplaceError::NotFound(_)
        ));
        assert!(matches!(
            classify(StatusCode::FORBIDDEN, String::new(), None),
            MarketplaceError::Unauthorized { status: 403, .. }
        ));
        assert!(matches!(
            classify(StatusCode::BAD_GATEWAY, String::new(), None),
            MarketplaceError::Server { status: 502, .. }
        ));
        assert!(matches!(
            classify(StatusCode::UNPROCESSABLE_ENTITY, String::new(), None),
            MarketplaceError::Rejected { status: 422, .. }
        ));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let body = "é".repeat(400);
        let truncated = truncate(&body);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= MAX_ERROR_BODY + 3);
    }

    #[test]
    fn test_join() {
        assert_eq!(join("https://api.example.com/", "/v1/lots"), "https://api.example.com/v1/lots");
        assert_eq!(join("http://127.0.0.1:80", "v1"), "http://127.0.0.1:80/v1");
    }
}
