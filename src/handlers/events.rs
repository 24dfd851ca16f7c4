use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{event, ticket_type};
use crate::errors::ServiceError;
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct TicketTypeResponse {
    pub id: Uuid,
    pub name: String,
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub capacity: i32,
    pub sold: i32,
    pub remaining: i32,
}

impl From<ticket_type::Model> for TicketTypeResponse {
    fn from(model: ticket_type::Model) -> Self {
        let remaining = model.remaining();
        Self {
            id: model.id,
            name: model.name,
            price: model.price,
            capacity: model.capacity,
            sold: model.sold,
            remaining,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: Option<String>,
    pub poster_url: Option<String>,
    pub status: String,
    pub payment_method: String,
    pub ticket_types: Vec<TicketTypeResponse>,
}

impl EventResponse {
    fn from_parts(model: event::Model, tickets: Vec<ticket_type::Model>) -> Self {
        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            date: model.date,
            time: model.time,
            location: model.location,
            poster_url: model.poster_url,
            status: model.status,
            payment_method: model.payment_method,
            ticket_types: tickets.into_iter().map(TicketTypeResponse::from).collect(),
        }
    }
}

/// Lists all events with their ticket availability, soonest first.
#[utoipa::path(
    get,
    path = "/api/v1/events",
    responses(
        (status = 200, description = "All events", body = [EventResponse])
    ),
    tag = "events"
)]
pub async fn list_events(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ServiceError> {
    let events = event::Entity::find()
        .order_by_asc(event::Column::Date)
        .find_with_related(ticket_type::Entity)
        .all(&*state.db)
        .await
        .map_err(ServiceError::db_error)?;

    let body: Vec<EventResponse> = events
        .into_iter()
        .map(|(event, tickets)| EventResponse::from_parts(event, tickets))
        .collect();

    Ok(Json(body))
}

/// Fetches one event with its ticket types.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event found", body = EventResponse),
        (status = 404, description = "Event not found")
    ),
    tag = "events"
)]
pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let event = event::Entity::find_by_id(id)
        .one(&*state.db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("event {} not found", id)))?;

    let tickets = ticket_type::Entity::find()
        .filter(ticket_type::Column::EventId.eq(event.id))
        .all(&*state.db)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(Json(EventResponse::from_parts(event, tickets)))
}

pub fn event_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_events))
        .route("/:id", get(get_event))
}
