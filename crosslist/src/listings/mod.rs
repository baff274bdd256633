//! Listing lifecycle: the registry, cross-listing and reconciliation.

mod orchestrator;
mod registry;
mod sync;

pub use orchestrator::{CrossListOrchestrator, CrossListResult, ProductListingView};
pub use registry::{ListingFilter, ListingRegistry, UpsertOutcome};
pub use sync::{ReconciliationSync, SaleConfirmation, SyncConfig, SyncSummary};
