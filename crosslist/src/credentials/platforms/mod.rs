//! Platform-specific token providers.

pub mod auctionflex;
pub mod ebay;
pub mod etsy;

pub use auctionflex::AuctionFlexKeyProvider;
pub use ebay::EbayTokenProvider;
pub use etsy::EtsyTokenProvider;
