use crate::error::{ApiError, ErrorResponse};
use crate::models::{
    AdminRequest, AdminResponse, AdminStatusResponse, ClaimsResponse, LoadCodesResponse,
};
use crate::routes;
use crate::state::AppState;
use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde_json::Value as JsonValue;

/// POST /admin handler - Load codes and inspect redemption state
///
/// Actions:
/// - load_codes: replace the code list (`codes`), optionally resetting the
///   claimed counter (`reset`, only JSON `true` resets)
/// - status: code totals
/// - claims: every claim, oldest first
#[utoipa::path(
    post,
    path = routes::ADMIN,
    request_body = AdminRequest,
    responses(
        (status = 200, description = "Action result", body = AdminResponse),
        (
            status = 400,
            description = "Invalid JSON, invalid codes, or unknown action",
            body = ErrorResponse
        ),
        (status = 401, description = "Missing or wrong admin secret", body = ErrorResponse),
        (status = 500, description = "Store error", body = ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn admin_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<AdminResponse>), ApiError> {
    let request: AdminRequest = serde_json::from_slice(&body)?;

    authorize(
        state.config.admin_secret.as_deref(),
        request.secret.as_ref().and_then(JsonValue::as_str),
    )?;

    let action = request.action.as_ref().and_then(JsonValue::as_str);
    let response = match action {
        Some("load_codes") => {
            let codes = parse_codes(request.codes)?;
            let reset = matches!(request.reset, Some(JsonValue::Bool(true)));
            let status = state.allocator.load_codes(&codes, reset).await?;
            AdminResponse::LoadCodes(LoadCodesResponse {
                success: true,
                total_codes: status.total,
                claimed_so_far: status.claimed,
                remaining: status.remaining,
            })
        }
        Some("status") => {
            let status = state.allocator.status().await?;
            AdminResponse::Status(AdminStatusResponse {
                total_codes: status.total,
                claimed: status.claimed,
                remaining: status.remaining,
            })
        }
        Some("claims") => {
            let claims = state.allocator.list_claims().await?;
            tracing::info!("Listed {} claims", claims.len());
            AdminResponse::Claims(ClaimsResponse {
                total_claims: claims.len(),
                claims,
            })
        }
        _ => return Err(ApiError::UnknownAction(action.map(str::to_string))),
    };

    Ok((StatusCode::OK, Json(response)))
}

fn authorize(expected: Option<&str>, provided: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        tracing::warn!("Admin request rejected: ADMIN_SECRET is not configured");
        return Err(ApiError::Unauthorized);
    };

    match provided {
        Some(provided) if constant_time_eq(provided.as_bytes(), expected.as_bytes()) => Ok(()),
        _ => {
            tracing::warn!("Admin request rejected: bad secret");
            Err(ApiError::Unauthorized)
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (left, right) in a.iter().zip(b.iter()) {
        diff |= left ^ right;
    }
    diff == 0
}

fn parse_codes(codes: Option<JsonValue>) -> Result<Vec<String>, ApiError> {
    let Some(JsonValue::Array(items)) = codes else {
        return Err(ApiError::InvalidInput("Provide a 'codes' array".to_string()));
    };

    items
        .into_iter()
        .map(|item| match item {
            JsonValue::String(code) => Ok(code),
            _ => Err(ApiError::InvalidInput(
                "'codes' must contain only strings".to_string(),
            )),
        })
        .collect()
}
