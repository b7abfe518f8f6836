use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::allocator::ClaimError;
use crate::store::StoreError;

/// Error response type
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Response type for health check endpoint
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Response type for unhealthy status
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct UnhealthyResponse {
    pub status: String,
    pub error: String,
}

/// Error type for API endpoints
///
/// Maps each failure to an HTTP status code and a JSON `{error}` body.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed request fields
    InvalidInput(String),
    /// Request body is not valid JSON for the endpoint
    JsonError(serde_json::Error),
    /// Admin action not recognised
    UnknownAction(Option<String>),
    /// Admin secret missing, wrong, or not configured
    Unauthorized,
    /// Key-value store failure
    StoreError(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::JsonError(err) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid JSON body: {}", err),
            ),
            ApiError::UnknownAction(action) => {
                tracing::info!("Rejected unknown admin action: {:?}", action);
                (
                    StatusCode::BAD_REQUEST,
                    "Unknown action. Use: load_codes, status, claims".to_string(),
                )
            }
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::StoreError(err) => {
                tracing::error!("Store error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Store error".to_string())
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

impl From<ClaimError> for ApiError {
    fn from(err: ClaimError) -> Self {
        match err {
            ClaimError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            ClaimError::Store(err) => ApiError::StoreError(err),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::JsonError(err)
    }
}
