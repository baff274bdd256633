//! API route modules, one per resource.

pub mod auctionflex;
pub mod connections;
pub mod crosslist;
pub mod health;
pub mod listings;
pub mod logging;
pub mod sync;
pub mod webhooks;

use axum::Router;

use crate::api::server::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/integrations/crosslist", crosslist::router())
        .nest("/api/integrations/listings", listings::router())
        .nest("/api/integrations/connections", connections::router())
        .nest("/api/integrations/sync", sync::router())
        .nest("/api/integrations/webhooks", webhooks::router())
        .nest("/api/integrations/auctionflex", auctionflex::router())
        .nest("/api/logging", logging::router())
        .nest("/health", health::router())
        .with_state(state)
}
