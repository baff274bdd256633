//! Process configuration read from the environment (and `.env`).

use std::time::Duration;

use marketplaces_api::auctionflex::DEFAULT_API_URL as AUCTIONFLEX_DEFAULT_API_URL;
use marketplaces_api::ebay::{EbayEnvironment, ListingPolicies};

use crate::adapters::ebay::{DEFAULT_CATEGORY_ID, DEFAULT_MARKETPLACE_ID};
use crate::adapters::etsy::DEFAULT_TAXONOMY_ID;
use crate::api::server::ApiServerConfig;
use crate::listings::SyncConfig;
use crate::{Error, Result};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:crosslist.db?mode=rwc";
pub const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug, Clone)]
pub struct EbayConfig {
    pub client_id: String,
    pub client_secret: String,
    /// The RuName registered for the application.
    pub redirect_uri: String,
    pub environment: EbayEnvironment,
    pub marketplace_id: String,
    pub category_id: String,
    pub policies: ListingPolicies,
}

#[derive(Debug, Clone)]
pub struct EtsyConfig {
    /// The app keystring, sent as `x-api-key` and used as the OAuth client id.
    pub api_key: String,
    pub redirect_uri: String,
    pub shop_id: Option<String>,
    pub taxonomy_id: i64,
}

#[derive(Debug, Clone)]
pub struct AuctionFlexConfig {
    pub api_url: String,
    /// Linked at startup when no connection exists yet.
    pub api_key: Option<String>,
    pub company_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub log_dir: String,
    pub server: ApiServerConfig,
    pub token_refresh_skew: Duration,
    /// `None` leaves reconciliation to external triggers.
    pub sync_interval: Option<Duration>,
    pub sync: SyncConfig,
    /// Shared secret webhook callers send in `X-Webhook-Secret`.
    pub webhook_secret: Option<String>,
    pub ebay: Option<EbayConfig>,
    pub etsy: Option<EtsyConfig>,
    pub auctionflex: AuctionFlexConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            log_dir: DEFAULT_LOG_DIR.to_string(),
            server: ApiServerConfig::default(),
            token_refresh_skew: Duration::from_secs(60),
            sync_interval: None,
            sync: SyncConfig::default(),
            webhook_secret: None,
            ebay: None,
            etsy: None,
            auctionflex: AuctionFlexConfig {
                api_url: AUCTIONFLEX_DEFAULT_API_URL.to_string(),
                api_key: None,
                company_id: None,
            },
        }
    }
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// Blank values count as unset. A platform missing any required variable
    /// is left unconfigured.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let mut server = defaults.server;
        if let Some(bind_address) = var("API_BIND_ADDRESS") {
            server.bind_address = bind_address;
        }
        if let Some(port) = parse_var(&var, "API_PORT")? {
            server.port = port;
        }

        let mut sync = defaults.sync;
        if let Some(threshold) = parse_var(&var, "SYNC_ERROR_THRESHOLD")? {
            sync.error_threshold = threshold;
        }
        if let Some(concurrency) = parse_var::<usize>(&var, "SYNC_CONCURRENCY")? {
            sync.concurrency = concurrency.max(1);
        }

        let token_refresh_skew = parse_var(&var, "TOKEN_REFRESH_SKEW_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.token_refresh_skew);
        let sync_interval = parse_var::<u64>(&var, "SYNC_INTERVAL_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let ebay = match (
            var("EBAY_CLIENT_ID"),
            var("EBAY_CLIENT_SECRET"),
            var("EBAY_REDIRECT_URI"),
        ) {
            (Some(client_id), Some(client_secret), Some(redirect_uri)) => Some(EbayConfig {
                client_id,
                client_secret,
                redirect_uri,
                environment: EbayEnvironment::from_sandbox_flag(
                    parse_var(&var, "EBAY_SANDBOX")?.unwrap_or(false),
                ),
                marketplace_id: var("EBAY_MARKETPLACE_ID")
                    .unwrap_or_else(|| DEFAULT_MARKETPLACE_ID.to_string()),
                category_id: var("EBAY_CATEGORY_ID")
                    .unwrap_or_else(|| DEFAULT_CATEGORY_ID.to_string()),
                policies: ListingPolicies {
                    fulfillment_policy_id: var("EBAY_FULFILLMENT_POLICY_ID"),
                    payment_policy_id: var("EBAY_PAYMENT_POLICY_ID"),
                    return_policy_id: var("EBAY_RETURN_POLICY_ID"),
                },
            }),
            _ => None,
        };

        let etsy = match (var("ETSY_API_KEY"), var("ETSY_REDIRECT_URI")) {
            (Some(api_key), Some(redirect_uri)) => Some(EtsyConfig {
                api_key,
                redirect_uri,
                shop_id: var("ETSY_SHOP_ID"),
                taxonomy_id: parse_var(&var, "ETSY_TAXONOMY_ID")?.unwrap_or(DEFAULT_TAXONOMY_ID),
            }),
            _ => None,
        };

        let auctionflex = AuctionFlexConfig {
            api_url: var("AUCTIONFLEX_API_URL")
                .unwrap_or_else(|| AUCTIONFLEX_DEFAULT_API_URL.to_string()),
            api_key: var("AUCTIONFLEX_API_KEY"),
            company_id: var("AUCTIONFLEX_COMPANY_ID"),
        };

        Ok(Self {
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url),
            log_dir: var("LOG_DIR").unwrap_or(defaults.log_dir),
            server,
            token_refresh_skew,
            sync_interval,
            sync,
            webhook_secret: var("WEBHOOK_SECRET"),
            ebay,
            etsy,
            auctionflex,
        })
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| Error::config(format!("{key}={raw:?} is invalid: {e}")))
        })
        .transpose()
}
