use axum::{middleware, routing::get, routing::post, Router};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::api_doc::ApiDoc;
use crate::cors;
use crate::handlers;
use crate::routes;
use crate::state::AppState;

/// Build the HTTP router with CORS, tracing and OpenAPI docs
pub fn build_router(state: AppState) -> Router {
    let redeem = Router::new()
        .route(
            routes::REDEEM,
            get(handlers::redeem_status_handler)
                .post(handlers::redeem_handler)
                .options(cors::preflight),
        )
        .layer(middleware::map_response(cors::redeem_headers));

    let admin = Router::new()
        .route(
            routes::ADMIN,
            post(handlers::admin_handler).options(cors::preflight),
        )
        .layer(middleware::map_response(cors::admin_headers));

    Router::new()
        .route(routes::HEALTH, get(handlers::health_handler))
        .merge(redeem)
        .merge(admin)
        .merge(
            utoipa_swagger_ui::SwaggerUi::new(routes::DOCS)
                .url(routes::OPENAPI_JSON, ApiDoc::openapi()),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
