//! Shared fixtures: an in-memory database, a scripted adapter and wiring helpers.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use crosslist::adapters::{
    AdapterRegistry, AttributeSet, CreatedListing, CrossListContext, EndOutcome, EventLotResult,
    ListingError, PlatformAdapter, RemoteStatus,
};
use crosslist::credentials::{AccessGrant, CredentialStore, TokenManager};
use crosslist::database::repositories::{SqlxCredentialStore, SqlxListingRegistry, SqlxProductStore};
use crosslist::database::{DbPool, init_memory_pool};
use crosslist::domain::{ListingHandle, ListingType, Platform, ProductSnapshot, TokenSet};
use crosslist::listings::{CrossListOrchestrator, ListingRegistry, ReconciliationSync, SyncConfig};
use crosslist::products::ProductStore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Failure a [`MockAdapter`] call is scripted to return.
#[derive(Debug, Clone)]
pub enum Scripted {
    Rejected(String),
    Transient(String),
    Gone,
}

impl Scripted {
    fn into_error(self) -> ListingError {
        match self {
            Self::Rejected(msg) => ListingError::ValidationRejected(msg),
            Self::Transient(msg) => ListingError::Transient(msg),
            Self::Gone => ListingError::NotFound("listing".into()),
        }
    }
}

#[derive(Default)]
struct MockState {
    next_ids: VecDeque<String>,
    counter: u32,
    create_failure: Option<Scripted>,
    create_delay: Option<Duration>,
    create_calls: usize,
    created: Vec<String>,
    statuses: HashMap<String, Result<RemoteStatus, Scripted>>,
    status_calls: usize,
    end_failure: Option<Scripted>,
    ended: Vec<String>,
    event_results: HashMap<String, Vec<EventLotResult>>,
}

/// In-memory platform with scripted outcomes and call counters.
pub struct MockAdapter {
    platform: Platform,
    requires_event: bool,
    state: Mutex<MockState>,
}

impl MockAdapter {
    pub fn new(platform: Platform) -> Arc<Self> {
        Arc::new(Self {
            platform,
            requires_event: platform == Platform::AuctionFlex,
            state: Mutex::new(MockState::default()),
        })
    }

    pub fn push_id(&self, id: &str) {
        self.state.lock().unwrap().next_ids.push_back(id.to_string());
    }

    pub fn fail_creates(&self, failure: Scripted) {
        self.state.lock().unwrap().create_failure = Some(failure);
    }

    pub fn set_create_delay(&self, delay: Duration) {
        self.state.lock().unwrap().create_delay = Some(delay);
    }

    pub fn set_status(&self, external_id: &str, status: RemoteStatus) {
        self.state
            .lock()
            .unwrap()
            .statuses
            .insert(external_id.to_string(), Ok(status));
    }

    pub fn fail_status(&self, external_id: &str, failure: Scripted) {
        self.state
            .lock()
            .unwrap()
            .statuses
            .insert(external_id.to_string(), Err(failure));
    }

    pub fn fail_ends(&self, failure: Option<Scripted>) {
        self.state.lock().unwrap().end_failure = failure;
    }

    pub fn set_event_results(&self, event_id: &str, results: Vec<EventLotResult>) {
        self.state
            .lock()
            .unwrap()
            .event_results
            .insert(event_id.to_string(), results);
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    pub fn status_calls(&self) -> usize {
        self.state.lock().unwrap().status_calls
    }

    pub fn ended(&self) -> Vec<String> {
        self.state.lock().unwrap().ended.clone()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn check_prerequisites(
        &self,
        _product: &ProductSnapshot,
        context: &CrossListContext,
    ) -> Result<(), ListingError> {
        if self.requires_event && context.auction_event_id.is_none() {
            return Err(ListingError::MissingPrerequisite(
                "AuctionFlex event ID required".into(),
            ));
        }
        Ok(())
    }

    fn map_attributes(&self, product: &ProductSnapshot) -> AttributeSet {
        let mut attrs = AttributeSet::new();
        if let Some(metal) = &product.metal_type {
            attrs.insert("Metal".into(), vec![metal.clone()]);
        }
        attrs
    }

    async fn create_listing(
        &self,
        _product: &ProductSnapshot,
        context: &CrossListContext,
        grant: &AccessGrant,
    ) -> Result<CreatedListing, ListingError> {
        assert_eq!(grant.platform, self.platform);
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.create_calls += 1;
            state.create_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if let Some(failure) = state.create_failure.clone() {
            return Err(failure.into_error());
        }
        state.counter += 1;
        let fallback = format!("{}-{}", self.platform.as_str().to_lowercase(), state.counter);
        let id = state.next_ids.pop_front().unwrap_or(fallback);
        state.created.push(id.clone());
        let external_ref = context.auction_event_id.clone();
        Ok(CreatedListing {
            external_url: Some(format!("https://mock.test/{id}")),
            external_id: id,
            external_ref,
        })
    }

    async fn end_listing(
        &self,
        handle: &ListingHandle,
        _grant: &AccessGrant,
    ) -> Result<EndOutcome, ListingError> {
        let mut state = self.state.lock().unwrap();
        if let Some(failure) = state.end_failure.clone() {
            return Err(failure.into_error());
        }
        state.ended.push(handle.external_id.clone());
        Ok(EndOutcome::Ended)
    }

    async fn fetch_status(
        &self,
        handle: &ListingHandle,
        _grant: &AccessGrant,
    ) -> Result<RemoteStatus, ListingError> {
        let mut state = self.state.lock().unwrap();
        state.status_calls += 1;
        match state.statuses.get(&handle.external_id).cloned() {
            Some(Ok(status)) => Ok(status),
            Some(Err(failure)) => Err(failure.into_error()),
            None => Ok(RemoteStatus::active()),
        }
    }

    async fn fetch_event_results(
        &self,
        event_id: &str,
        _grant: &AccessGrant,
    ) -> Result<Vec<EventLotResult>, ListingError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .event_results
            .get(event_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Engine wired against an in-memory database and mock adapters.
pub struct Harness {
    pub pool: DbPool,
    pub credentials: Arc<SqlxCredentialStore>,
    pub registry: Arc<SqlxListingRegistry>,
    pub products: Arc<SqlxProductStore>,
    pub tokens: Arc<TokenManager>,
    pub adapters: AdapterRegistry,
    pub orchestrator: Arc<CrossListOrchestrator>,
    pub sync: Arc<ReconciliationSync>,
}

impl Harness {
    pub async fn new(adapters: &[Arc<MockAdapter>]) -> Self {
        Self::with_sync_config(adapters, SyncConfig::default()).await
    }

    pub async fn with_sync_config(adapters: &[Arc<MockAdapter>], config: SyncConfig) -> Self {
        Self::with_product_store(adapters, config, |products| products as Arc<dyn ProductStore>)
            .await
    }

    /// Wires the engine against a wrapper around the real product store.
    pub async fn with_product_store(
        adapters: &[Arc<MockAdapter>],
        config: SyncConfig,
        wrap: impl FnOnce(Arc<SqlxProductStore>) -> Arc<dyn ProductStore>,
    ) -> Self {
        let pool = init_memory_pool().await.unwrap();
        let credentials = Arc::new(SqlxCredentialStore::new(pool.clone()));
        let registry = Arc::new(SqlxListingRegistry::new(pool.clone()));
        let products = Arc::new(SqlxProductStore::new(pool.clone()));
        let product_store = wrap(products.clone());
        let tokens = Arc::new(TokenManager::new(
            credentials.clone() as Arc<dyn CredentialStore>,
            Duration::from_secs(60),
        ));

        let mut registered = AdapterRegistry::new();
        for adapter in adapters {
            registered.register(adapter.clone() as Arc<dyn PlatformAdapter>);
        }

        let orchestrator = Arc::new(CrossListOrchestrator::new(
            tokens.clone(),
            credentials.clone() as Arc<dyn CredentialStore>,
            registered.clone(),
            registry.clone() as Arc<dyn ListingRegistry>,
            product_store.clone(),
        ));
        let sync = Arc::new(ReconciliationSync::new(
            tokens.clone(),
            registered.clone(),
            registry.clone() as Arc<dyn ListingRegistry>,
            product_store,
            config,
        ));

        Self {
            pool,
            credentials,
            registry,
            products,
            tokens,
            adapters: registered,
            orchestrator,
            sync,
        }
    }

    /// Stores a non-expiring grant so no refresh is ever attempted.
    pub async fn connect(&self, platform: Platform) -> String {
        let tokens = TokenSet {
            access_token: format!("token-{}", platform.as_str()),
            refresh_token: None,
            expires_at: None,
            store_id: Some("store-1".into()),
        };
        self.credentials.upsert(platform, &tokens).await.unwrap().id
    }

    pub async fn seed_product(&self, product: &ProductSnapshot) {
        self.products.insert_product(product).await.unwrap();
    }
}

/// Product store whose next `mark_sold` calls fail.
pub struct FlakyProducts {
    inner: Arc<SqlxProductStore>,
    failures: AtomicUsize,
}

impl FlakyProducts {
    pub fn failing(inner: Arc<SqlxProductStore>, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failures: AtomicUsize::new(failures),
        })
    }
}

#[async_trait]
impl ProductStore for FlakyProducts {
    async fn get_product(&self, product_id: &str) -> crosslist::Result<ProductSnapshot> {
        self.inner.get_product(product_id).await
    }

    async fn mark_sold(
        &self,
        product_id: &str,
        amount: Option<Decimal>,
    ) -> crosslist::Result<bool> {
        let pending = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(crosslist::Error::Other("product store unavailable".into()));
        }
        self.inner.mark_sold(product_id, amount).await
    }
}

/// Graded silver coin, the usual fixed-price fixture.
pub fn silver_coin(id: &str) -> ProductSnapshot {
    let mut product = ProductSnapshot::new(id, format!("SKU-{id}"), "1921 Morgan Silver Dollar MS63");
    product.description = "Morgan dollar, PCGS MS63".into();
    product.price = Some(dec!(250.00));
    product.condition = Some("used".into());
    product.year = Some(1921);
    product.mint = Some("Philadelphia".into());
    product.grade = Some("MS63".into());
    product.certification = Some("PCGS".into());
    product.metal_type = Some("SILVER".into());
    product.metal_weight = Some(dec!(0.7734));
    product.image_urls = vec!["https://img.test/front.jpg".into()];
    product
}

pub fn auction_lot(id: &str) -> ProductSnapshot {
    let mut product = silver_coin(id);
    product.listing_type = ListingType::Auction;
    product.auction = Some(crosslist::domain::AuctionTerms {
        start_price: Some(dec!(100)),
        reserve_price: Some(dec!(200)),
        buy_now_price: None,
    });
    product
}
