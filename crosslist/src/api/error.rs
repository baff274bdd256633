//! JSON error responses for the HTTP API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::adapters::{ListingError, ListingErrorKind};
use crate::credentials::TokenError;
use crate::error::Error;

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound { entity_type, id } => {
                ApiError::not_found(format!("{entity_type} with id '{id}' not found"))
            }
            Error::Validation(msg) => ApiError::validation(msg),
            Error::Configuration(msg) => ApiError::bad_request(msg),
            Error::InvalidStateTransition { from, to } => {
                ApiError::conflict(format!("Cannot transition from {from} to {to}"))
            }
            Error::DatabaseSqlx(e) => {
                tracing::error!("Database error: {}", e);
                ApiError::internal("Database error occurred")
            }
            _ => {
                tracing::error!("Unexpected error: {}", err);
                ApiError::internal("An unexpected error occurred")
            }
        }
    }
}

impl From<ListingError> for ApiError {
    fn from(err: ListingError) -> Self {
        let kind = err.kind();
        let status = match kind {
            ListingErrorKind::NotConnected | ListingErrorKind::ReauthorizationRequired => {
                StatusCode::CONFLICT
            }
            ListingErrorKind::ValidationRejected | ListingErrorKind::MissingPrerequisite => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ListingErrorKind::AlreadySold => StatusCode::CONFLICT,
            ListingErrorKind::NotFound => StatusCode::NOT_FOUND,
            ListingErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ListingErrorKind::TransientNetworkError => StatusCode::BAD_GATEWAY,
            ListingErrorKind::Unsupported => StatusCode::BAD_REQUEST,
            ListingErrorKind::Internal => {
                tracing::error!("Listing operation failed: {}", err);
                return ApiError::internal("An unexpected error occurred");
            }
        };
        ApiError::new(status, kind.as_str(), err.to_string())
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match &err {
            TokenError::InvalidState => ApiError::bad_request(err.to_string()),
            TokenError::CredentialsRejected(_) => ApiError::validation(err.to_string()),
            TokenError::UnsupportedPlatform(_) | TokenError::Unsupported(_) => {
                ApiError::bad_request(err.to_string())
            }
            TokenError::Storage(_) => {
                tracing::error!("Credential storage error: {}", err);
                ApiError::internal("Credential storage error")
            }
            _ => ListingError::from(err).into(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Platform;

    #[test]
    fn test_api_error_creation() {
        let err = ApiError::not_found("Listing not found");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "NOT_FOUND");
    }

    #[test]
    fn test_listing_error_mapping() {
        let err = ApiError::from(ListingError::NotConnected(Platform::Etsy));
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, "NotConnected");
        assert_eq!(err.message, "Etsy is not connected");

        let err = ApiError::from(ListingError::ValidationRejected("bad title".into()));
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);

        let err = ApiError::from(ListingError::Internal("boom".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("boom"));
    }

    #[test]
    fn test_token_error_mapping() {
        assert_eq!(
            ApiError::from(TokenError::InvalidState).status,
            StatusCode::BAD_REQUEST
        );
        let err = ApiError::from(TokenError::reauthorization(Platform::Ebay, "invalid_grant"));
        assert_eq!(err.code, "ReauthorizationRequired");
    }

    #[test]
    fn test_error_mapping() {
        let err: ApiError = Error::not_found("Product", "p1").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        let err: ApiError = Error::invalid_transition("SOLD", "ACTIVE").into();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }
}
