//! Reconciliation triggers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::post,
};

use crate::api::error::ApiResult;
use crate::api::models::{EventSyncQuery, parse_platform};
use crate::api::server::AppState;
use crate::domain::Platform;
use crate::listings::SyncSummary;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(sync_all))
        .route("/events/{event_id}", post(sync_event))
}

async fn sync_all(State(state): State<AppState>) -> ApiResult<Json<SyncSummary>> {
    Ok(Json(state.sync.sync_all().await?))
}

/// Bulk result pull for an auction event; defaults to AuctionFlex.
async fn sync_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Query(query): Query<EventSyncQuery>,
) -> ApiResult<Json<SyncSummary>> {
    let platform = match query.platform {
        Some(raw) => parse_platform(&raw)?,
        None => Platform::AuctionFlex,
    };
    Ok(Json(state.sync.sync_event(platform, &event_id).await?))
}
