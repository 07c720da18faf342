//! Axum router construction.
//!
//! Builds the full application router: public config reads, the SSE
//! stream, the admin CRUD/publish surface, and health -- with request-id,
//! CORS, and tracing layers applied last so every route gets them.

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let public = Router::new()
        .route("/config/{org}/{app}/{env}", get(routes::config_read::get_config_by_slugs))
        .route("/config/api/{apiKey}/{env}", get(routes::config_read::get_config_by_api_key))
        .route("/events/{org}/{app}/{env}", get(routes::events::events_by_slugs))
        .route("/events/api/{apiKey}/{env}", get(routes::events::events_by_api_key));

    let admin = Router::new()
        .route("/admin/organizations", post(routes::admin::create_organization))
        .route("/admin/organizations", get(routes::admin::list_organizations))
        .route("/admin/organizations/{org}", get(routes::admin::get_organization))
        .route("/admin/organizations/{org}", delete(routes::admin::delete_organization))
        .route("/admin/organizations/{org}/applications", post(routes::admin::create_application))
        .route("/admin/organizations/{org}/applications", get(routes::admin::list_applications))
        .route("/admin/organizations/{org}/applications/{app}", get(routes::admin::get_application))
        .route("/admin/organizations/{org}/applications/{app}", delete(routes::admin::delete_application))
        .route(
            "/admin/organizations/{org}/applications/{app}/environments",
            post(routes::admin::create_environment),
        )
        .route(
            "/admin/organizations/{org}/applications/{app}/environments",
            get(routes::admin::list_environments),
        )
        .route(
            "/admin/organizations/{org}/applications/{app}/environments/{env}",
            get(routes::admin::get_environment),
        )
        .route("/admin/config/{org}/{app}/{env}", post(routes::admin::publish_config))
        .route(
            "/admin/config/{org}/{app}/{env}/rollback/{version}",
            post(routes::admin::rollback_config),
        )
        .route("/admin/config/{org}/{app}/{env}/versions", get(routes::admin::list_versions))
        .route("/admin/config/{org}/{app}/{env}/history", get(routes::admin::get_history));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(public)
        .merge(admin)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
