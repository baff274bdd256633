//! Cross-lists inventory to eBay, Etsy and AuctionFlex360 and keeps each
//! platform's listing state reconciled with the local registry.

pub mod adapters;
pub mod api;
pub mod config;
pub mod credentials;
pub mod database;
pub mod domain;
pub mod error;
pub mod listings;
pub mod logging;
pub mod products;
pub mod services;

pub use error::{Error, Result};
