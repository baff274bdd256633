//! Builds the engine from configuration and owns its lifecycle.

use std::sync::Arc;
use std::time::Duration;

use marketplaces_api::auctionflex::AuctionFlexClient;
use marketplaces_api::client::build_client;
use marketplaces_api::ebay::EbayClient;
use marketplaces_api::etsy::EtsyClient;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::adapters::{
    AdapterRegistry, AuctionFlexAdapter, EbayAdapter, EbayListingConfig, EtsyAdapter,
    EtsyListingConfig,
};
use crate::api::server::AppState;
use crate::config::AppConfig;
use crate::credentials::platforms::{AuctionFlexKeyProvider, EbayTokenProvider, EtsyTokenProvider};
use crate::credentials::{CredentialStore, TokenManager};
use crate::database::DbPool;
use crate::database::repositories::{SqlxCredentialStore, SqlxListingRegistry, SqlxProductStore};
use crate::domain::Platform;
use crate::listings::{CrossListOrchestrator, ListingRegistry, ReconciliationSync};
use crate::products::ProductStore;

pub struct ServiceContainer {
    pub config: AppConfig,
    pub pool: DbPool,
    pub credentials: Arc<dyn CredentialStore>,
    pub registry: Arc<dyn ListingRegistry>,
    pub products: Arc<SqlxProductStore>,
    pub tokens: Arc<TokenManager>,
    pub adapters: AdapterRegistry,
    pub auctionflex: Arc<AuctionFlexAdapter>,
    pub orchestrator: Arc<CrossListOrchestrator>,
    pub sync: Arc<ReconciliationSync>,
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Wires every service on top of an initialized pool.
    ///
    /// eBay and Etsy are registered only when configured; AuctionFlex is
    /// always available and becomes usable once its API key is linked.
    pub fn new(config: AppConfig, pool: DbPool) -> Result<Self> {
        let http = build_client(None).map_err(|e| crate::Error::config(e.to_string()))?;

        let credentials: Arc<dyn CredentialStore> = Arc::new(SqlxCredentialStore::new(pool.clone()));
        let registry: Arc<dyn ListingRegistry> = Arc::new(SqlxListingRegistry::new(pool.clone()));
        let products = Arc::new(SqlxProductStore::new(pool.clone()));

        let mut tokens = TokenManager::new(credentials.clone(), config.token_refresh_skew);
        let mut adapters = AdapterRegistry::new();

        if let Some(ebay) = &config.ebay {
            tokens.register_provider(Arc::new(EbayTokenProvider::new(
                http.clone(),
                ebay.environment,
                ebay.client_id.clone(),
                ebay.client_secret.clone(),
                ebay.redirect_uri.clone(),
            )));
            adapters.register(Arc::new(EbayAdapter::new(
                EbayClient::new(http.clone(), ebay.environment),
                EbayListingConfig {
                    environment: ebay.environment,
                    marketplace_id: ebay.marketplace_id.clone(),
                    category_id: ebay.category_id.clone(),
                    policies: ebay.policies.clone(),
                    ..EbayListingConfig::default()
                },
            )));
            info!(environment = ?ebay.environment, "eBay registered");
        } else {
            debug!("eBay not configured");
        }

        if let Some(etsy) = &config.etsy {
            tokens.register_provider(Arc::new(EtsyTokenProvider::new(
                http.clone(),
                etsy.api_key.clone(),
                etsy.redirect_uri.clone(),
                etsy.shop_id.clone(),
            )));
            adapters.register(Arc::new(EtsyAdapter::new(
                EtsyClient::new(http.clone(), etsy.api_key.clone()),
                EtsyListingConfig {
                    taxonomy_id: etsy.taxonomy_id,
                },
            )));
            info!("Etsy registered");
        } else {
            debug!("Etsy not configured");
        }

        let auctionflex_client = AuctionFlexClient::new(http, config.auctionflex.api_url.clone());
        tokens.register_provider(Arc::new(AuctionFlexKeyProvider::new(
            auctionflex_client.clone(),
        )));
        let auctionflex = Arc::new(AuctionFlexAdapter::new(auctionflex_client));
        adapters.register(auctionflex.clone());

        let tokens = Arc::new(tokens);
        let orchestrator = Arc::new(CrossListOrchestrator::new(
            tokens.clone(),
            credentials.clone(),
            adapters.clone(),
            registry.clone(),
            products.clone() as Arc<dyn ProductStore>,
        ));
        let sync = Arc::new(ReconciliationSync::new(
            tokens.clone(),
            adapters.clone(),
            registry.clone(),
            products.clone() as Arc<dyn ProductStore>,
            config.sync.clone(),
        ));

        info!(platforms = ?adapters.platforms(), "Services wired");
        Ok(Self {
            config,
            pool,
            credentials,
            registry,
            products,
            tokens,
            adapters,
            auctionflex,
            orchestrator,
            sync,
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Links AuctionFlex from `AUCTIONFLEX_API_KEY` / `AUCTIONFLEX_COMPANY_ID`
    /// when no active connection exists yet.
    pub async fn initialize(&self) -> Result<()> {
        let af = &self.config.auctionflex;
        let (Some(api_key), Some(company_id)) = (&af.api_key, &af.company_id) else {
            return Ok(());
        };

        let connected = self
            .credentials
            .get(Platform::AuctionFlex)
            .await?
            .is_some_and(|c| c.is_active);
        if connected {
            debug!("AuctionFlex already linked");
            return Ok(());
        }

        match self
            .tokens
            .link_api_key(Platform::AuctionFlex, api_key.clone(), Some(company_id.clone()))
            .await
        {
            Ok(_) => info!("AuctionFlex linked from environment"),
            Err(e) => warn!(error = %e, "Failed to link AuctionFlex from environment"),
        }
        Ok(())
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(self.orchestrator.clone(), self.sync.clone(), self.tokens.clone())
            .with_auctionflex(self.auctionflex.clone())
            .with_pool(self.pool.clone())
            .with_webhook_secret(self.config.webhook_secret.clone())
    }

    /// Runs a reconciliation pass every `interval` until shutdown.
    pub fn start_sync_scheduler(&self, interval: Duration) {
        let sync = self.sync.clone();
        let cancellation_token = self.cancellation_token.clone();
        info!(interval_secs = interval.as_secs(), "Periodic reconciliation enabled");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; start one interval after boot.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => {
                        debug!("Sync scheduler shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = sync.sync_all().await {
                            error!(error = %e, "Scheduled reconciliation failed");
                        }
                    }
                }
            }
        });
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub async fn shutdown(&self) {
        info!("Shutting down services");
        self.cancellation_token.cancel();
        self.pool.close().await;
        info!("Services shut down");
    }
}
