//! Platform connection routes: status, OAuth linking, API-key linking.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{
    ApiKeyLinkRequest, AuthorizeResponse, LinkedResponse, OAuthCallbackQuery, parse_platform,
};
use crate::api::server::AppState;
use crate::credentials::ConnectionStatus;
use crate::domain::PlatformConnection;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_connections))
        .route("/{platform}", delete(unlink))
        .route("/{platform}/authorize", post(authorize))
        .route("/{platform}/callback", get(callback))
        .route("/{platform}/api-key", post(link_api_key))
}

async fn list_connections(State(state): State<AppState>) -> ApiResult<Json<Vec<ConnectionStatus>>> {
    Ok(Json(state.tokens.connection_statuses().await?))
}

/// Starts the consent flow; the operator opens the returned URL.
async fn authorize(
    State(state): State<AppState>,
    Path(platform): Path<String>,
) -> ApiResult<Json<AuthorizeResponse>> {
    let platform = parse_platform(&platform)?;
    let request = state.tokens.begin_authorization(platform)?;
    Ok(Json(AuthorizeResponse {
        url: request.url,
        state: request.state,
    }))
}

async fn callback(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Query(query): Query<OAuthCallbackQuery>,
) -> ApiResult<Json<LinkedResponse>> {
    let platform = parse_platform(&platform)?;
    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        return Err(ApiError::bad_request(format!(
            "Authorization was declined: {error} {description}"
        ))
        .with_details(serde_json::json!({ "error": error })));
    }
    let (Some(code), Some(auth_state)) = (query.code, query.state) else {
        return Err(ApiError::bad_request("code and state are required"));
    };

    let connection = state
        .tokens
        .complete_authorization(platform, &code, &auth_state)
        .await?;
    Ok(Json(linked(connection)))
}

async fn link_api_key(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Json(request): Json<ApiKeyLinkRequest>,
) -> ApiResult<Json<LinkedResponse>> {
    let platform = parse_platform(&platform)?;
    if platform.uses_oauth() {
        return Err(ApiError::bad_request(format!(
            "{} is linked through the authorization flow",
            platform.display_name()
        )));
    }
    let api_key = request.api_key.trim().to_string();
    if api_key.is_empty() {
        return Err(ApiError::validation("apiKey is required"));
    }

    let connection = state
        .tokens
        .link_api_key(platform, api_key, request.company_id)
        .await?;
    Ok(Json(linked(connection)))
}

async fn unlink(State(state): State<AppState>, Path(platform): Path<String>) -> ApiResult<StatusCode> {
    let platform = parse_platform(&platform)?;
    state.tokens.unlink(platform).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn linked(connection: PlatformConnection) -> LinkedResponse {
    LinkedResponse {
        platform: connection.platform,
        connection_id: connection.id,
        store_id: connection.store_id,
        expires_at: connection.expires_at,
    }
}
