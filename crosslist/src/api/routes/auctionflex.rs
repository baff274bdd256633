//! AuctionFlex event management.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use marketplaces_api::auctionflex::Category;

use crate::adapters::AuctionFlexAdapter;
use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{CreateEventRequest, CreateEventResponse};
use crate::api::server::AppState;
use crate::credentials::AccessGrant;
use crate::domain::Platform;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event))
        .route("/events/{event_id}/publish", post(publish_event))
        .route("/categories", get(categories))
}

async fn adapter_and_grant(state: &AppState) -> ApiResult<(Arc<AuctionFlexAdapter>, AccessGrant)> {
    let adapter = state
        .auctionflex
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("AuctionFlex360 is not configured"))?;
    let grant = state.tokens.ensure_valid_token(Platform::AuctionFlex).await?;
    Ok((adapter, grant))
}

async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> ApiResult<(StatusCode, Json<CreateEventResponse>)> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    let (adapter, grant) = adapter_and_grant(&state).await?;
    let event_id = adapter
        .create_event(&grant, name, request.start_date, request.end_date)
        .await?;
    Ok((StatusCode::CREATED, Json(CreateEventResponse { event_id })))
}

async fn publish_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<StatusCode> {
    let (adapter, grant) = adapter_and_grant(&state).await?;
    adapter.publish_event(&grant, &event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    let (adapter, grant) = adapter_and_grant(&state).await?;
    Ok(Json(adapter.categories(&grant).await?))
}
