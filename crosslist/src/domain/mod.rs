//! Domain types shared by the credential, adapter and listing layers.

pub mod connection;
pub mod listing;
pub mod platform;
pub mod product;

pub use connection::{LinkState, PlatformConnection, TokenSet};
pub use listing::{ListingHandle, ListingStatus, NewListing, PlatformListing};
pub use platform::Platform;
pub use product::{AuctionTerms, ListingType, ProductSnapshot, ProductStatus};
