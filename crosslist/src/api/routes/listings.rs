//! Per-product listing routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};

use crate::api::error::ApiResult;
use crate::api::models::{RemoveListingResponse, parse_platform};
use crate::api::server::AppState;
use crate::listings::ProductListingView;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{product_id}", get(get_product_listings))
        .route("/{product_id}/{platform}", delete(remove_listing))
}

async fn get_product_listings(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> ApiResult<Json<Vec<ProductListingView>>> {
    Ok(Json(state.orchestrator.product_listings(&product_id).await?))
}

/// Ends the listing on the platform and marks it removed.
async fn remove_listing(
    State(state): State<AppState>,
    Path((product_id, platform)): Path<(String, String)>,
) -> ApiResult<Json<RemoveListingResponse>> {
    let platform = parse_platform(&platform)?;
    let listing = state
        .orchestrator
        .remove_from_platform(&product_id, platform)
        .await?;
    Ok(Json(RemoveListingResponse {
        platform: listing.platform,
        external_id: listing.external_id,
        status: listing.status,
    }))
}
