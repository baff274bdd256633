//! Platform credential storage and token lifecycle.
//!
//! - [`CredentialStore`]: persistence of one connection per platform
//! - [`TokenProvider`]: platform token endpoint integration
//! - [`TokenManager`]: single-flight refresh and account linking

mod error;
mod provider;
mod service;
mod store;
mod tracker;

pub mod platforms;

pub use error::TokenError;
pub use provider::{AuthorizationRequest, TokenProvider};
pub use service::{AccessGrant, ConnectionStatus, TokenManager};
pub use store::CredentialStore;
pub use tracker::{FailureInfo, RefreshFailureTracker};
