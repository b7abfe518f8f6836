use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::allocator::ClaimResult;
use crate::claims::Claim;

/// Request body for POST /redeem
#[derive(Deserialize, utoipa::ToSchema)]
pub struct RedeemRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Response body for POST /redeem
#[derive(Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RedeemResponse {
    Success {
        code: String,
        remaining: u64,
        total: u64,
    },
    AlreadyClaimed {
        code: String,
        name: String,
    },
    Exhausted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl From<ClaimResult> for RedeemResponse {
    fn from(result: ClaimResult) -> Self {
        match result {
            ClaimResult::Success { code, remaining, total } => {
                RedeemResponse::Success { code, remaining, total }
            }
            ClaimResult::AlreadyClaimed { code, name } => {
                RedeemResponse::AlreadyClaimed { code, name }
            }
            ClaimResult::Exhausted { configured } => RedeemResponse::Exhausted {
                error: (!configured).then(|| "No promo codes available.".to_string()),
            },
        }
    }
}

/// Request body for POST /admin
///
/// Fields stay untyped so the secret is checked before anything else is
/// interpreted.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct AdminRequest {
    #[schema(value_type = Option<String>)]
    pub secret: Option<JsonValue>,
    #[schema(value_type = Option<String>)]
    pub action: Option<JsonValue>,
    #[schema(value_type = Option<Vec<String>>)]
    pub codes: Option<JsonValue>,
    #[schema(value_type = Option<bool>)]
    pub reset: Option<JsonValue>,
}

/// Response for the `load_codes` admin action
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadCodesResponse {
    pub success: bool,
    pub total_codes: u64,
    pub claimed_so_far: u64,
    pub remaining: u64,
}

/// Response for the `status` admin action
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatusResponse {
    pub total_codes: u64,
    pub claimed: u64,
    pub remaining: u64,
}

/// Response for the `claims` admin action
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsResponse {
    pub total_claims: usize,
    pub claims: Vec<Claim>,
}

/// Response body for POST /admin, shaped by the requested action
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(untagged)]
pub enum AdminResponse {
    LoadCodes(LoadCodesResponse),
    Status(AdminStatusResponse),
    Claims(ClaimsResponse),
}
