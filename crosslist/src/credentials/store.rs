//! Credential persistence abstraction.
//!
//! Keeps the token lifecycle logic decoupled from the concrete database layer.

use async_trait::async_trait;

use crate::Result;
use crate::domain::{Platform, PlatformConnection, TokenSet};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, platform: Platform) -> Result<Option<PlatformConnection>>;

    /// Creates or replaces the platform's connection and marks it active.
    ///
    /// A `None` store id keeps the previously stored one.
    async fn upsert(&self, platform: Platform, tokens: &TokenSet) -> Result<PlatformConnection>;

    /// Marks the connection unusable until it is linked again.
    async fn deactivate(&self, platform: Platform) -> Result<()>;

    async fn list_active(&self) -> Result<Vec<PlatformConnection>>;

    async fn list_all(&self) -> Result<Vec<PlatformConnection>>;
}
