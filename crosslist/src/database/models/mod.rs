//! Row types mirroring the schema, with conversions into domain types.

pub mod connection;
pub mod listing;
pub mod product;

pub use connection::*;
pub use listing::*;
pub use product::*;
