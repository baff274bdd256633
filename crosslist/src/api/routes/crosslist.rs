//! Cross-listing routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::post,
};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{
    CrossListRequest, CrossListResponse, ProductListingsQuery, ProductListingsResponse,
    parse_platform,
};
use crate::api::server::AppState;
use crate::domain::Platform;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(cross_list).get(product_listings))
}

/// Publishes a product to the requested platforms.
///
/// Always answers 200 with one result per platform once the product is
/// loaded; per-platform failures are inside the results.
async fn cross_list(
    State(state): State<AppState>,
    Json(request): Json<CrossListRequest>,
) -> ApiResult<Json<CrossListResponse>> {
    let product_id = request.product_id.trim().to_string();
    if product_id.is_empty() {
        return Err(ApiError::validation("productId is required"));
    }
    if request.platforms.is_empty() {
        return Err(ApiError::validation("At least one platform is required"));
    }
    let platforms = request
        .platforms
        .iter()
        .map(|p| parse_platform(p))
        .collect::<Result<Vec<Platform>, _>>()?;

    info!(%product_id, ?platforms, "Cross-list requested");
    let results = state
        .orchestrator
        .cross_list(&product_id, &platforms, request.context)
        .await?;
    Ok(Json(CrossListResponse::new(product_id, results)))
}

async fn product_listings(
    State(state): State<AppState>,
    Query(query): Query<ProductListingsQuery>,
) -> ApiResult<Json<ProductListingsResponse>> {
    let listings = state.orchestrator.product_listings(&query.product_id).await?;
    let connected_platforms = state.orchestrator.active_connections().await?;
    Ok(Json(ProductListingsResponse {
        product_id: query.product_id,
        listings,
        connected_platforms,
    }))
}
