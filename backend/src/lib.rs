//! Blood Bank Management System - backend library
//!
//! Persistence, services and HTTP transport over the pure inventory logic in
//! the `shared` crate.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};

use services::NotificationService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub notifier: NotificationService,
}

impl AppState {
    pub fn new(db: sqlx::PgPool, config: Config) -> Self {
        let notifier = NotificationService::new(&config.notification);
        Self {
            db,
            config: Arc::new(config),
            notifier,
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Blood Bank Management System API v1.0"
}
