#![forbid(unsafe_code)]

//! Tikiti: event ticketing backend with M-Pesa STK push payments.
//!
//! Bookings start PENDING and a payment gateway callback drives them to PAID
//! or FAILED. PAID is terminal and is the only transition that consumes seat
//! inventory and issues a ticket code.

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod mpesa;
pub mod openapi;
pub mod services;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::handlers::AppServices;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: AppConfig,
    pub event_sender: EventSender,
    pub services: AppServices,
}

/// Standard envelope for the service endpoints that are not resource-shaped.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

async fn service_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
    })))
}

/// Liveness plus a database round-trip.
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.db.ping().await {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::ok(json!({"database": "up"})))),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::error(format!("database unreachable: {}", e))),
        ),
    }
}

/// All versioned API routes, mounted by the binary under `/api/v1`.
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(service_status))
        .route("/health", get(health))
        .nest("/events", handlers::events::event_routes())
        .nest("/bookings", handlers::bookings::booking_routes())
        .nest("/payments", handlers::payments::payment_routes())
}
