use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::AppState;

use super::{handlers, middleware as mw};

pub fn audit_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(handlers::create_audit))
        .route("/:audit_id", get(handlers::get_audit))
        .route("/:audit_id/report", get(handlers::get_audit_report))
}

pub fn audit_item_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/:item_id",
            get(handlers::get_audit_item).put(handlers::update_audit_item),
        )
        .route(
            "/:item_id/data-requests",
            post(handlers::request_item_evidence),
        )
}

pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(handlers::create_user))
        .route("/standards", post(handlers::create_standard))
        .route("/controls", post(handlers::create_control))
        .route("/implementations", post(handlers::create_implementation))
        .route("/settings", put(handlers::update_settings))
}

/// Full application router
pub fn app_router(state: Arc<AppState>) -> Router {
    // Admin routes (require ADMIN_API_KEY)
    let admin = admin_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        mw::require_admin_api_key,
    ));

    // Protected routes (require API key if configured)
    let protected_routes = Router::new()
        .nest("/audits", audit_routes())
        .nest("/audit-items", audit_item_routes())
        .route("/users", get(handlers::list_users))
        .route("/notifications", get(handlers::list_notifications))
        .route("/auth/providers", get(handlers::list_providers))
        .nest("/admin", admin)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            mw::require_api_key,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(state)
}
