use axum::{response::IntoResponse, routing::get, Json, Router};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod migrator;
pub mod services;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::handlers::AppServices;

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: Arc<EventSender>,
    pub services: AppServices,
}

/// Generic envelope for ad-hoc JSON responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Builds the versioned API router. Authentication is enforced per-handler
/// through the [`auth::CustomerContext`] extractor.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/cart", handlers::carts::cart_routes())
        .nest("/payments", handlers::payments::payment_routes())
        .nest("/checkout", handlers::checkout::checkout_routes())
        .nest("/orders", handlers::orders::order_routes())
}

/// Full application router including operational endpoints.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status))
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
}

async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl IntoResponse {
    let database = match state.db.ping().await {
        Ok(()) => "up",
        Err(_) => "down",
    };
    let status = if database == "up" { "ok" } else { "degraded" };
    Json(HealthResponse { status, database })
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    name: &'static str,
    version: &'static str,
    environment: String,
}

async fn status(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl IntoResponse {
    Json(StatusResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
    })
}
