//! Thin, typed clients for the marketplaces the cross-lister publishes to.
//!
//! Each client only speaks HTTP: token acquisition, persistence and listing
//! bookkeeping live in the application crate.

pub mod auctionflex;
pub mod client;
pub mod ebay;
pub mod error;
pub mod etsy;
pub mod oauth;
pub mod retry;

pub use error::MarketplaceError;
pub use retry::{RetryPolicy, with_retry, with_retry_unsent};
