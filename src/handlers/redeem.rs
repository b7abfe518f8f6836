use crate::codes::CodeStatus;
use crate::error::{ApiError, ErrorResponse};
use crate::models::{RedeemRequest, RedeemResponse};
use crate::routes;
use crate::state::AppState;
use axum::{body::Bytes, extract::State, http::StatusCode, Json};

/// GET /redeem handler - How many codes are left
#[utoipa::path(
    get,
    path = routes::REDEEM,
    responses(
        (status = 200, description = "Current code counts", body = CodeStatus),
        (status = 500, description = "Store error", body = ErrorResponse)
    ),
    tag = "redeem"
)]
pub async fn redeem_status_handler(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CodeStatus>), ApiError> {
    let status = state.allocator.status().await?;
    Ok((StatusCode::OK, Json(status)))
}

/// POST /redeem handler - Claim a code for an email address
///
/// Replaying an email returns the code it was first given. Running out of
/// codes is reported as `exhausted` with 200 OK.
#[utoipa::path(
    post,
    path = routes::REDEEM,
    request_body = RedeemRequest,
    responses(
        (status = 200, description = "Redemption outcome", body = RedeemResponse),
        (status = 400, description = "Invalid JSON or invalid name/email", body = ErrorResponse),
        (status = 500, description = "Store error", body = ErrorResponse)
    ),
    tag = "redeem"
)]
pub async fn redeem_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<RedeemResponse>), ApiError> {
    let request: RedeemRequest = serde_json::from_slice(&body)?;

    let result = state
        .allocator
        .redeem(
            request.name.as_deref().unwrap_or_default(),
            request.email.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok((StatusCode::OK, Json(result.into())))
}
