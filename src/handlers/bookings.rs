use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::booking;
use crate::errors::ServiceError;
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBookingRequest {
    #[validate(length(min = 1, max = 120))]
    pub customer_name: String,
    #[validate(length(min = 9, max = 15))]
    pub phone_number: String,
    pub event_id: Uuid,
    pub ticket_type_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingResponse {
    pub id: Uuid,
    pub customer_name: String,
    pub phone_number: String,
    pub event_id: Uuid,
    pub ticket_type_id: Uuid,
    pub payment_status: String,
    pub ticket_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<booking::Model> for BookingResponse {
    fn from(model: booking::Model) -> Self {
        Self {
            id: model.id,
            customer_name: model.customer_name,
            phone_number: model.phone_number,
            event_id: model.event_id,
            ticket_type_id: model.ticket_type_id,
            payment_status: model.payment_status,
            ticket_code: model.ticket_code,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Creates a PENDING booking for an event's ticket type.
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking created", body = BookingResponse),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Event or ticket type not found"),
        (status = 409, description = "Ticket type sold out")
    ),
    tag = "bookings"
)]
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let booking = state
        .services
        .bookings
        .create_booking(
            &payload.customer_name,
            &payload.phone_number,
            payload.event_id,
            payload.ticket_type_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(BookingResponse::from(booking))))
}

/// Fetches a booking by id.
#[utoipa::path(
    get,
    path = "/api/v1/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking found", body = BookingResponse),
        (status = 404, description = "Booking not found")
    ),
    tag = "bookings"
)]
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let booking = state.services.bookings.get_booking(id).await?;
    Ok(Json(BookingResponse::from(booking)))
}

pub fn booking_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_booking))
        .route("/:id", get(get_booking))
}
