pub mod auth;
pub mod middleware;
pub mod payments;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;
use auth::{login_handler, logout_handler, signup_handler};
use payments::{create_order_handler, verify_payment_handler};
use rest::{
    account_handler, health_handler, history_handler, pricing_handler, query_handler,
    quota_handler, recent_handler, ApiDoc,
};
use state::AppState;

pub use middleware::require_auth;

/// Builds the full application router: public and session-protected routes,
/// CORS for the configured web origin, and the Swagger UI.
pub fn router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = app_state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS origin: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/api/pricing", get(pricing_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/account", get(account_handler))
        .route("/api/quota", get(quota_handler))
        .route("/api/query", post(query_handler))
        .route("/api/history", get(history_handler))
        .route("/api/recent", get(recent_handler))
        .route("/api/create-order", post(create_order_handler))
        .route("/api/verify-payment", post(verify_payment_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(cors)
        .with_state(app_state);

    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
