//! Route definitions for the API.

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use std::sync::Arc;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers;
use super::middleware::auth::{admin_middleware, auth_middleware};
use super::middleware::tracing::correlation_id_middleware;
use super::SharedState;
use crate::services::auth_service::AuthService;

/// Create the main API router
pub fn create_router(state: SharedState) -> Router {
    let openapi = super::openapi::build_openapi();

    Router::new()
        // Health endpoints (no auth required)
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/livez", get(handlers::health::liveness_check))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .nest("/api/v1", api_v1_routes(state.clone()))
        .layer(middleware::from_fn(correlation_id_middleware))
        .with_state(state)
}

/// API v1 routes
fn api_v1_routes(state: SharedState) -> Router<SharedState> {
    let auth_service = Arc::new(AuthService::new(state.db.clone(), state.config.clone()));
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .nest("/auth", handlers::auth::public_router())
        .nest(
            "/auth",
            handlers::auth::protected_router().layer(middleware::from_fn_with_state(
                auth_service.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/matrix",
            handlers::matrix::router().layer(middleware::from_fn_with_state(
                auth_service.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/artifacts",
            handlers::artifacts::router()
                .layer(DefaultBodyLimit::max(max_upload_bytes))
                .layer(middleware::from_fn_with_state(
                    auth_service.clone(),
                    auth_middleware,
                )),
        )
        .nest(
            "/taxonomy",
            handlers::taxonomy::router().layer(middleware::from_fn_with_state(
                auth_service.clone(),
                auth_middleware,
            )),
        )
        // Staff-only routes
        .nest(
            "/admin/taxonomy",
            handlers::taxonomy::admin_router()
                .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB
                .layer(middleware::from_fn_with_state(
                    auth_service.clone(),
                    admin_middleware,
                )),
        )
        .nest(
            "/audit-log",
            handlers::audit::router().layer(middleware::from_fn_with_state(
                auth_service,
                admin_middleware,
            )),
        )
}
