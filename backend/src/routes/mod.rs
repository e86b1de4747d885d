//! Route definitions for the Blood Bank Management System

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes. Every route requires a bearer token.
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/inventory", inventory_routes())
        .nest("/catalog", catalog_routes())
        .nest("/config", config_routes())
        .route(
            "/alerts/danger",
            get(handlers::list_danger_alerts).post(handlers::record_danger_alert),
        )
        .route("/analytics", get(handlers::get_analytics))
        .route(
            "/inbound",
            get(handlers::list_inbound).post(handlers::import_inbound),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Stock status, movements and reconciliation
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(handlers::get_inventory_status))
        .route("/update", post(handlers::update_stock))
        .route("/bulk-save", post(handlers::bulk_save))
        .route("/ledger", get(handlers::list_ledger))
}

/// Products and safety thresholds
fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(handlers::list_products))
        .route(
            "/thresholds",
            get(handlers::list_thresholds).put(handlers::update_threshold),
        )
}

/// Parameter overrides, resolution and audit history
fn config_routes() -> Router<AppState> {
    Router::new()
        .route("/overrides", get(handlers::list_overrides))
        .route("/parameters", put(handlers::update_parameters))
        .route("/resolve", get(handlers::resolve_parameters))
        .route("/history", get(handlers::list_config_history))
        .route(
            "/rbc-ratio",
            get(handlers::get_split_ratio).put(handlers::update_split_ratio),
        )
}
