//! Token lifecycle manager.
//!
//! Hands out usable access grants, refreshing expired ones at most once per
//! platform no matter how many callers ask concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::error::TokenError;
use super::provider::{AuthorizationRequest, TokenProvider};
use super::store::CredentialStore;
use super::tracker::RefreshFailureTracker;
use crate::domain::{LinkState, Platform, PlatformConnection, TokenSet};

const AUTHORIZATION_TTL: Duration = Duration::from_secs(15 * 60);

/// A usable access credential for one platform.
#[derive(Clone)]
pub struct AccessGrant {
    pub platform: Platform,
    pub connection_id: String,
    pub access_token: String,
    /// Shop id (Etsy) or company id (AuctionFlex).
    pub store_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGrant")
            .field("platform", &self.platform)
            .field("connection_id", &self.connection_id)
            .field("access_token", &"<redacted>")
            .field("store_id", &self.store_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl From<&PlatformConnection> for AccessGrant {
    fn from(conn: &PlatformConnection) -> Self {
        Self {
            platform: conn.platform,
            connection_id: conn.id.clone(),
            access_token: conn.access_token.clone(),
            store_id: conn.store_id.clone(),
            expires_at: conn.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub platform: Platform,
    /// A token provider is registered, i.e. the platform is configured.
    pub configured: bool,
    pub state: LinkState,
    pub store_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_failures: u32,
    pub last_refresh_error: Option<String>,
}

struct PendingAuthorization {
    platform: Platform,
    code_verifier: Option<String>,
    created_at: std::time::Instant,
}

pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    providers: HashMap<Platform, Arc<dyn TokenProvider>>,
    /// Per-platform locks so only one refresh runs at a time.
    refresh_locks: DashMap<Platform, Arc<Mutex<()>>>,
    failure_tracker: Arc<RefreshFailureTracker>,
    /// Refreshed grants whose persistence failed; retried on the next request.
    unsaved: DashMap<Platform, TokenSet>,
    pending: DashMap<String, PendingAuthorization>,
    skew: chrono::Duration,
}

impl TokenManager {
    /// `refresh_skew` is how long before expiry a token is already treated as expired.
    pub fn new(store: Arc<dyn CredentialStore>, refresh_skew: Duration) -> Self {
        Self {
            store,
            providers: HashMap::new(),
            refresh_locks: DashMap::new(),
            failure_tracker: Arc::new(RefreshFailureTracker::new()),
            unsaved: DashMap::new(),
            pending: DashMap::new(),
            skew: chrono::Duration::from_std(refresh_skew).unwrap_or(chrono::Duration::seconds(60)),
        }
    }

    pub fn register_provider(&mut self, provider: Arc<dyn TokenProvider>) {
        self.providers.insert(provider.platform(), provider);
    }

    pub fn has_provider(&self, platform: Platform) -> bool {
        self.providers.contains_key(&platform)
    }

    pub fn failure_tracker(&self) -> Arc<RefreshFailureTracker> {
        Arc::clone(&self.failure_tracker)
    }

    /// Returns a grant that stays valid for at least the refresh skew.
    ///
    /// Concurrent callers that find the token expired wait on a single refresh
    /// and reuse its result.
    #[instrument(skip(self), fields(platform = %platform))]
    pub async fn ensure_valid_token(&self, platform: Platform) -> Result<AccessGrant, TokenError> {
        self.flush_unsaved(platform).await;

        let connection = self.load_usable(platform).await?;
        if connection.is_fresh(Utc::now(), self.skew) {
            return Ok(AccessGrant::from(&connection));
        }

        let lock = self.refresh_lock(platform);
        let _guard = lock.lock().await;

        // Another caller may have refreshed while we waited.
        let connection = self.load_usable(platform).await?;
        if connection.is_fresh(Utc::now(), self.skew) {
            debug!("Token already refreshed by a concurrent caller");
            return Ok(AccessGrant::from(&connection));
        }

        self.perform_refresh(connection).await
    }

    async fn perform_refresh(
        &self,
        connection: PlatformConnection,
    ) -> Result<AccessGrant, TokenError> {
        let platform = connection.platform;
        let provider = self.get_provider(platform)?;

        if !provider.supports_refresh() || connection.refresh_token.is_none() {
            warn!("Token expired and cannot be refreshed; deactivating connection");
            self.failure_tracker
                .record_failure(platform, "missing refresh token");
            self.store.deactivate(platform).await?;
            return Err(TokenError::reauthorization(
                platform,
                "token expired and no refresh token is available",
            ));
        }

        info!("Refreshing access token");
        match provider.refresh(&connection).await {
            Ok(tokens) => {
                let merged = TokenSet {
                    refresh_token: tokens.refresh_token.or(connection.refresh_token.clone()),
                    store_id: tokens.store_id.or(connection.store_id.clone()),
                    ..tokens
                };
                self.failure_tracker.clear(platform);
                info!(expires_at = ?merged.expires_at, "Access token refreshed");

                match self.store.upsert(platform, &merged).await {
                    Ok(updated) => Ok(AccessGrant::from(&updated)),
                    Err(e) => {
                        // The old refresh token may already be rotated away; keep the new one.
                        error!(error = %e, "Failed to persist refreshed token; holding it in memory");
                        let grant = AccessGrant {
                            platform,
                            connection_id: connection.id.clone(),
                            access_token: merged.access_token.clone(),
                            store_id: merged.store_id.clone(),
                            expires_at: merged.expires_at,
                        };
                        self.unsaved.insert(platform, merged);
                        Ok(grant)
                    }
                }
            }
            Err(e) if e.requires_relink() => {
                let failure_count = self.failure_tracker.record_failure(platform, &e.to_string());
                error!(error = %e, %failure_count, "Refresh rejected; connection requires re-authorization");
                self.store.deactivate(platform).await?;
                Err(e)
            }
            Err(e) => {
                let failure_count = self.failure_tracker.record_failure(platform, &e.to_string());
                warn!(error = %e, %failure_count, "Token refresh failed transiently");
                Err(e)
            }
        }
    }

    /// Loads the connection, overlaying any refreshed grant that is not yet persisted.
    async fn load_usable(&self, platform: Platform) -> Result<PlatformConnection, TokenError> {
        let mut connection = self
            .store
            .get(platform)
            .await?
            .ok_or(TokenError::NotConnected(platform))?;

        if !connection.is_active {
            return Err(TokenError::reauthorization(
                platform,
                "connection has been deactivated",
            ));
        }

        if let Some(unsaved) = self.unsaved.get(&platform) {
            connection.access_token = unsaved.access_token.clone();
            connection.refresh_token = unsaved.refresh_token.clone();
            connection.expires_at = unsaved.expires_at;
            connection.store_id = unsaved.store_id.clone();
        }
        Ok(connection)
    }

    async fn flush_unsaved(&self, platform: Platform) {
        let Some(tokens) = self.unsaved.get(&platform).map(|t| t.clone()) else {
            return;
        };
        match self.store.upsert(platform, &tokens).await {
            Ok(_) => {
                info!(%platform, "Persisted previously unsaved token");
                self.unsaved.remove(&platform);
            }
            Err(e) => warn!(%platform, error = %e, "Token still not persisted"),
        }
    }

    /// Starts the OAuth consent flow for `platform`.
    pub fn begin_authorization(&self, platform: Platform) -> Result<AuthorizationRequest, TokenError> {
        let provider = self.get_provider(platform)?;
        let state = marketplaces_api::oauth::random_state();
        let request = provider.authorization_request(&state)?;

        self.pending
            .retain(|_, p| p.created_at.elapsed() < AUTHORIZATION_TTL);
        self.pending.insert(
            request.state.clone(),
            PendingAuthorization {
                platform,
                code_verifier: request.code_verifier.clone(),
                created_at: std::time::Instant::now(),
            },
        );
        Ok(request)
    }

    /// Finishes the consent flow: exchanges `code` and stores the resulting grant.
    #[instrument(skip(self, code, state), fields(platform = %platform))]
    pub async fn complete_authorization(
        &self,
        platform: Platform,
        code: &str,
        state: &str,
    ) -> Result<PlatformConnection, TokenError> {
        let provider = self.get_provider(platform)?;
        let (_, pending) = self.pending.remove(state).ok_or(TokenError::InvalidState)?;
        if pending.platform != platform || pending.created_at.elapsed() >= AUTHORIZATION_TTL {
            return Err(TokenError::InvalidState);
        }

        let tokens = provider
            .exchange_code(code, pending.code_verifier.as_deref())
            .await?;
        let connection = self.store.upsert(platform, &tokens).await?;
        self.unsaved.remove(&platform);
        self.failure_tracker.clear(platform);
        info!(connection_id = %connection.id, "Platform linked");
        Ok(connection)
    }

    /// Links a platform that authenticates with a static API key.
    #[instrument(skip(self, api_key), fields(platform = %platform))]
    pub async fn link_api_key(
        &self,
        platform: Platform,
        api_key: String,
        store_id: Option<String>,
    ) -> Result<PlatformConnection, TokenError> {
        let provider = self.get_provider(platform)?;
        let tokens = TokenSet {
            access_token: api_key,
            refresh_token: None,
            expires_at: None,
            store_id,
        };
        if !provider.validate(&tokens).await? {
            warn!("Platform rejected the supplied API key");
            return Err(TokenError::CredentialsRejected(platform));
        }

        let connection = self.store.upsert(platform, &tokens).await?;
        self.unsaved.remove(&platform);
        self.failure_tracker.clear(platform);
        info!(connection_id = %connection.id, "Platform linked with API key");
        Ok(connection)
    }

    pub async fn unlink(&self, platform: Platform) -> Result<(), TokenError> {
        self.store.deactivate(platform).await?;
        self.unsaved.remove(&platform);
        info!(%platform, "Platform connection deactivated");
        Ok(())
    }

    pub async fn connection_statuses(&self) -> Result<Vec<ConnectionStatus>, TokenError> {
        let now = Utc::now();
        let mut statuses = Vec::with_capacity(Platform::ALL.len());
        for platform in Platform::ALL {
            let connection = self.store.get(platform).await?;
            let failure = self.failure_tracker.get_failure_info(platform);
            statuses.push(ConnectionStatus {
                platform,
                configured: self.has_provider(platform),
                state: connection
                    .as_ref()
                    .map(|c| c.link_state(now, self.skew))
                    .unwrap_or(LinkState::Unlinked),
                store_id: connection.as_ref().and_then(|c| c.store_id.clone()),
                expires_at: connection.as_ref().and_then(|c| c.expires_at),
                refresh_failures: failure.as_ref().map(|f| f.count).unwrap_or(0),
                last_refresh_error: failure.map(|f| f.last_error),
            });
        }
        Ok(statuses)
    }

    fn get_provider(&self, platform: Platform) -> Result<&Arc<dyn TokenProvider>, TokenError> {
        self.providers
            .get(&platform)
            .ok_or(TokenError::UnsupportedPlatform(platform))
    }

    fn refresh_lock(&self, platform: Platform) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(platform)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MemoryStore {
        rows: StdMutex<HashMap<Platform, PlatformConnection>>,
        fail_upserts: AtomicBool,
    }

    impl MemoryStore {
        fn with(conn: PlatformConnection) -> Arc<Self> {
            let store = Self::default();
            store.rows.lock().unwrap().insert(conn.platform, conn);
            Arc::new(store)
        }

        fn row(&self, platform: Platform) -> Option<PlatformConnection> {
            self.rows.lock().unwrap().get(&platform).cloned()
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryStore {
        async fn get(&self, platform: Platform) -> crate::Result<Option<PlatformConnection>> {
            Ok(self.row(platform))
        }

        async fn upsert(
            &self,
            platform: Platform,
            tokens: &TokenSet,
        ) -> crate::Result<PlatformConnection> {
            if self.fail_upserts.load(Ordering::SeqCst) {
                return Err(crate::Error::Other("disk full".into()));
            }
            let mut rows = self.rows.lock().unwrap();
            let now = Utc::now();
            let conn = rows.entry(platform).or_insert_with(|| connection(platform, None, None));
            conn.access_token = tokens.access_token.clone();
            conn.refresh_token = tokens.refresh_token.clone();
            conn.expires_at = tokens.expires_at;
            if tokens.store_id.is_some() {
                conn.store_id = tokens.store_id.clone();
            }
            conn.is_active = true;
            conn.updated_at = now;
            Ok(conn.clone())
        }

        async fn deactivate(&self, platform: Platform) -> crate::Result<()> {
            if let Some(conn) = self.rows.lock().unwrap().get_mut(&platform) {
                conn.is_active = false;
            }
            Ok(())
        }

        async fn list_active(&self) -> crate::Result<Vec<PlatformConnection>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|c| c.is_active)
                .cloned()
                .collect())
        }

        async fn list_all(&self) -> crate::Result<Vec<PlatformConnection>> {
            Ok(self.rows.lock().unwrap().values().cloned().collect())
        }
    }

    #[derive(Clone, Copy)]
    enum Outcome {
        Refresh,
        Revoked,
        Outage,
    }

    struct MockProvider {
        platform: Platform,
        calls: AtomicUsize,
        outcome: Outcome,
        rotate: bool,
    }

    impl MockProvider {
        fn new(platform: Platform, outcome: Outcome) -> Arc<Self> {
            Arc::new(Self {
                platform,
                calls: AtomicUsize::new(0),
                outcome,
                rotate: false,
            })
        }
    }

    #[async_trait]
    impl TokenProvider for MockProvider {
        fn platform(&self) -> Platform {
            self.platform
        }

        fn supports_refresh(&self) -> bool {
            self.platform.uses_oauth()
        }

        async fn refresh(&self, _connection: &PlatformConnection) -> Result<TokenSet, TokenError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(50)).await;
            match self.outcome {
                Outcome::Refresh => Ok(TokenSet {
                    access_token: format!("access-{n}"),
                    refresh_token: self.rotate.then(|| format!("refresh-{n}")),
                    expires_at: Some(Utc::now() + chrono::Duration::hours(2)),
                    store_id: None,
                }),
                Outcome::Revoked => Err(TokenError::reauthorization(self.platform, "invalid_grant")),
                Outcome::Outage => Err(TokenError::Transient("503".into())),
            }
        }

        async fn validate(&self, tokens: &TokenSet) -> Result<bool, TokenError> {
            Ok(tokens.access_token != "bad-key")
        }
    }

    fn connection(
        platform: Platform,
        expires_at: Option<DateTime<Utc>>,
        refresh_token: Option<&str>,
    ) -> PlatformConnection {
        let now = Utc::now();
        PlatformConnection {
            id: format!("conn-{}", platform.as_str()),
            platform,
            access_token: "access-0".into(),
            refresh_token: refresh_token.map(str::to_string),
            expires_at,
            store_id: Some("shop-1".into()),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn expired(platform: Platform) -> PlatformConnection {
        connection(
            platform,
            Some(Utc::now() - chrono::Duration::minutes(5)),
            Some("refresh-0"),
        )
    }

    fn manager(store: Arc<MemoryStore>, provider: Arc<MockProvider>) -> TokenManager {
        let mut manager = TokenManager::new(store, Duration::from_secs(60));
        manager.register_provider(provider);
        manager
    }

    #[tokio::test]
    async fn test_fresh_token_is_returned_without_refresh() {
        let store = MemoryStore::with(connection(
            Platform::Ebay,
            Some(Utc::now() + chrono::Duration::hours(1)),
            Some("r"),
        ));
        let provider = MockProvider::new(Platform::Ebay, Outcome::Refresh);
        let manager = manager(store, provider.clone());

        let grant = manager.ensure_valid_token(Platform::Ebay).await.unwrap();
        assert_eq!(grant.access_token, "access-0");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let store = MemoryStore::with(expired(Platform::Etsy));
        let provider = MockProvider::new(Platform::Etsy, Outcome::Refresh);
        let manager = manager(store.clone(), provider.clone());

        let results = futures::future::join_all(
            (0..10).map(|_| manager.ensure_valid_token(Platform::Etsy)),
        )
        .await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap().access_token, "access-1");
        }
        let row = store.row(Platform::Etsy).unwrap();
        assert_eq!(row.access_token, "access-1");
        // The provider did not rotate the refresh token, so the old one is kept.
        assert_eq!(row.refresh_token.as_deref(), Some("refresh-0"));
        assert_eq!(row.store_id.as_deref(), Some("shop-1"));
    }

    #[tokio::test]
    async fn test_revoked_grant_deactivates_connection() {
        let store = MemoryStore::with(expired(Platform::Ebay));
        let provider = MockProvider::new(Platform::Ebay, Outcome::Revoked);
        let manager = manager(store.clone(), provider.clone());

        let err = manager.ensure_valid_token(Platform::Ebay).await.unwrap_err();
        assert!(matches!(err, TokenError::ReauthorizationRequired { .. }));
        assert!(!store.row(Platform::Ebay).unwrap().is_active);
        assert_eq!(manager.failure_tracker().failure_count(Platform::Ebay), 1);

        // Later callers fail fast without hitting the token endpoint.
        let err = manager.ensure_valid_token(Platform::Ebay).await.unwrap_err();
        assert!(err.requires_relink());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_connection_active() {
        let store = MemoryStore::with(expired(Platform::Etsy));
        let provider = MockProvider::new(Platform::Etsy, Outcome::Outage);
        let manager = manager(store.clone(), provider);

        let err = manager.ensure_valid_token(Platform::Etsy).await.unwrap_err();
        assert!(err.is_transient());
        assert!(store.row(Platform::Etsy).unwrap().is_active);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_requires_relink() {
        let store = MemoryStore::with(connection(
            Platform::Ebay,
            Some(Utc::now() - chrono::Duration::minutes(1)),
            None,
        ));
        let provider = MockProvider::new(Platform::Ebay, Outcome::Refresh);
        let manager = manager(store.clone(), provider.clone());

        let err = manager.ensure_valid_token(Platform::Ebay).await.unwrap_err();
        assert!(matches!(err, TokenError::ReauthorizationRequired { .. }));
        assert!(!store.row(Platform::Ebay).unwrap().is_active);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unlinked_platform_is_not_connected() {
        let store = Arc::new(MemoryStore::default());
        let provider = MockProvider::new(Platform::Ebay, Outcome::Refresh);
        let manager = manager(store, provider);

        let err = manager.ensure_valid_token(Platform::Ebay).await.unwrap_err();
        assert!(matches!(err, TokenError::NotConnected(Platform::Ebay)));
    }

    #[tokio::test]
    async fn test_api_key_never_expires() {
        let store = MemoryStore::with(connection(Platform::AuctionFlex, None, None));
        let provider = MockProvider::new(Platform::AuctionFlex, Outcome::Refresh);
        let manager = manager(store, provider.clone());

        for _ in 0..3 {
            manager.ensure_valid_token(Platform::AuctionFlex).await.unwrap();
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unpersisted_refresh_is_not_lost() {
        let store = MemoryStore::with(expired(Platform::Etsy));
        let provider = Arc::new(MockProvider {
            platform: Platform::Etsy,
            calls: AtomicUsize::new(0),
            outcome: Outcome::Refresh,
            rotate: true,
        });
        let manager = manager(store.clone(), provider.clone());

        store.fail_upserts.store(true, Ordering::SeqCst);
        let grant = manager.ensure_valid_token(Platform::Etsy).await.unwrap();
        assert_eq!(grant.access_token, "access-1");
        assert_eq!(store.row(Platform::Etsy).unwrap().access_token, "access-0");

        // Still unpersisted: the in-memory grant is served instead of refreshing again.
        let grant = manager.ensure_valid_token(Platform::Etsy).await.unwrap();
        assert_eq!(grant.access_token, "access-1");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        store.fail_upserts.store(false, Ordering::SeqCst);
        manager.ensure_valid_token(Platform::Etsy).await.unwrap();
        let row = store.row(Platform::Etsy).unwrap();
        assert_eq!(row.access_token, "access-1");
        assert_eq!(row.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_link_api_key_validates_first() {
        let store = Arc::new(MemoryStore::default());
        let provider = MockProvider::new(Platform::AuctionFlex, Outcome::Refresh);
        let manager = manager(store.clone(), provider);

        let err = manager
            .link_api_key(Platform::AuctionFlex, "bad-key".into(), Some("co".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::CredentialsRejected(_)));
        assert!(store.row(Platform::AuctionFlex).is_none());

        let conn = manager
            .link_api_key(Platform::AuctionFlex, "good-key".into(), Some("co".into()))
            .await
            .unwrap();
        assert!(conn.is_active);
        assert!(conn.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_unknown_authorization_state_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let provider = MockProvider::new(Platform::Etsy, Outcome::Refresh);
        let manager = manager(store, provider);

        let err = manager
            .complete_authorization(Platform::Etsy, "code", "never-issued")
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidState));
    }

    #[tokio::test]
    async fn test_connection_statuses_cover_every_platform() {
        let store = MemoryStore::with(connection(Platform::AuctionFlex, None, None));
        let provider = MockProvider::new(Platform::AuctionFlex, Outcome::Refresh);
        let manager = manager(store, provider);

        let statuses = manager.connection_statuses().await.unwrap();
        assert_eq!(statuses.len(), 3);
        let af = statuses
            .iter()
            .find(|s| s.platform == Platform::AuctionFlex)
            .unwrap();
        assert!(af.configured);
        assert_eq!(af.state, LinkState::Linked);
        let ebay = statuses.iter().find(|s| s.platform == Platform::Ebay).unwrap();
        assert!(!ebay.configured);
        assert_eq!(ebay.state, LinkState::Unlinked);
    }
}
