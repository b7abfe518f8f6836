// Route path constants - single source of truth for all API paths

pub const HEALTH: &str = "/health";
pub const REDEEM: &str = "/redeem";
pub const ADMIN: &str = "/admin";
pub const DOCS: &str = "/docs";
pub const OPENAPI_JSON: &str = "/openapi.json";
