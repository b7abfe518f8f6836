use utoipa::OpenApi;

use crate::claims::Claim;
use crate::codes::CodeStatus;
use crate::error::{ErrorResponse, HealthResponse, UnhealthyResponse};
use crate::handlers;
use crate::models::{
    AdminRequest, AdminResponse, AdminStatusResponse, ClaimsResponse, LoadCodesResponse,
    RedeemRequest, RedeemResponse,
};

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "promo-redeem API",
        version = "1.0.0",
        description = "Hands out one promo code per email address"
    ),
    paths(
        handlers::health::health_handler,
        handlers::redeem::redeem_status_handler,
        handlers::redeem::redeem_handler,
        handlers::admin::admin_handler
    ),
    components(
        schemas(
            RedeemRequest,
            RedeemResponse,
            CodeStatus,
            AdminRequest,
            AdminResponse,
            LoadCodesResponse,
            AdminStatusResponse,
            ClaimsResponse,
            Claim,
            ErrorResponse,
            HealthResponse,
            UnhealthyResponse
        )
    ),
    tags(
        (name = "health", description = "Health check operations"),
        (name = "redeem", description = "Public code redemption"),
        (name = "admin", description = "Code loading and reporting (requires the admin secret)")
    )
)]
pub struct ApiDoc;
