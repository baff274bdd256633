//! Repository layer: SQLx implementations of the persistence traits.

pub mod connection;
pub mod listing;
pub mod product;

pub use connection::SqlxCredentialStore;
pub use listing::SqlxListingRegistry;
pub use product::SqlxProductStore;
