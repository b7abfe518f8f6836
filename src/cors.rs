use axum::{
    http::{header, HeaderValue, StatusCode},
    response::Response,
};

const REDEEM_METHODS: &str = "POST, GET, OPTIONS";
const ADMIN_METHODS: &str = "POST, OPTIONS";

/// Permissive CORS headers for the browser-facing routes
fn with_cors(mut response: Response, methods: &'static str) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(methods),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

pub async fn redeem_headers(response: Response) -> Response {
    with_cors(response, REDEEM_METHODS)
}

pub async fn admin_headers(response: Response) -> Response {
    with_cors(response, ADMIN_METHODS)
}

/// OPTIONS handler; the route's header layer supplies the CORS headers
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}
