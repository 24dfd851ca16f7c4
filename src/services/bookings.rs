//! Booking lifecycle: PENDING -> FAILED / PAID, with PAID terminal.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionError, TransactionTrait,
};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::entities::booking::{self, BookingPaymentStatus, Entity as BookingEntity};
use crate::entities::event::Entity as EventEntity;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::inventory::SeatInventoryService;

/// Prefix used when an event title yields no usable initials.
const FALLBACK_CODE_PREFIX: &str = "NGX";

/// Derives a human-readable ticket code from the event title and seat
/// sequence, e.g. seat 7 of "World Rally Championship" -> "WRC-007".
///
/// Pure and deterministic; confirmation relies on that for idempotency.
pub fn ticket_code(event_title: &str, seat_sequence: i32) -> String {
    let mut prefix = String::new();
    for word in event_title.split_whitespace() {
        if prefix.chars().count() >= 3 {
            break;
        }
        if let Some(first) = word.chars().next() {
            let upper = first.to_uppercase().next().unwrap_or(first);
            if upper.is_alphanumeric() {
                prefix.push(upper);
            }
        }
    }

    if prefix.is_empty() {
        prefix = FALLBACK_CODE_PREFIX.to_string();
    }

    format!("{}-{:03}", prefix, seat_sequence)
}

/// A ticket issued by a successful confirmation.
#[derive(Debug, Clone)]
struct IssuedTicket {
    seat_sequence: i32,
    ticket_code: String,
}

/// Service owning booking state transitions.
#[derive(Clone)]
pub struct BookingService {
    db: Arc<DatabaseConnection>,
    inventory: SeatInventoryService,
    event_sender: EventSender,
}

impl BookingService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        inventory: SeatInventoryService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            inventory,
            event_sender,
        }
    }

    /// Creates a PENDING booking.
    ///
    /// The capacity check here is advisory only; seats are not reserved
    /// until payment confirmation, which re-checks authoritatively.
    #[instrument(skip(self, customer_name, phone_number))]
    pub async fn create_booking(
        &self,
        customer_name: &str,
        phone_number: &str,
        event_id: Uuid,
        ticket_type_id: Uuid,
    ) -> Result<booking::Model, ServiceError> {
        let db = &*self.db;

        let event = EventEntity::find_by_id(event_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("event {} not found", event_id)))?;

        let ticket = self.inventory.get_ticket_type(db, ticket_type_id).await?;
        if ticket.event_id != event.id {
            return Err(ServiceError::BadRequest(format!(
                "ticket type {} does not belong to event {}",
                ticket_type_id, event_id
            )));
        }
        if ticket.is_sold_out() {
            return Err(ServiceError::SoldOut(format!(
                "ticket type {} is sold out",
                ticket_type_id
            )));
        }

        let new_booking = booking::ActiveModel {
            customer_name: Set(customer_name.to_string()),
            phone_number: Set(phone_number.to_string()),
            event_id: Set(event_id),
            ticket_type_id: Set(ticket_type_id),
            payment_status: Set(BookingPaymentStatus::Pending.as_str().to_string()),
            ticket_code: Set(None),
            ..Default::default()
        };

        let booking = new_booking
            .insert(db)
            .await
            .map_err(ServiceError::db_error)?;

        if let Err(e) = self
            .event_sender
            .send(Event::BookingCreated(booking.id))
            .await
        {
            warn!(booking_id = %booking.id, error = %e, "failed to publish BookingCreated");
        }

        Ok(booking)
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        BookingEntity::find_by_id(booking_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("booking {} not found", booking_id)))
    }

    /// Confirms a paid booking: reserves a seat, issues the ticket code and
    /// sets the booking PAID, all in one transaction.
    ///
    /// Idempotent: an already-paid booking is returned unchanged and the
    /// seat counter is not touched again. Fails with `SoldOut` when the
    /// payment settled after capacity ran out.
    #[instrument(skip(self))]
    pub async fn confirm_paid(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        let inventory = self.inventory.clone();

        let (booking, issued) = self
            .db
            .transaction::<_, (booking::Model, Option<IssuedTicket>), ServiceError>(move |txn| {
                Box::pin(async move {
                    let booking = BookingEntity::find_by_id(booking_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("booking {} not found", booking_id))
                        })?;

                    if booking.is_paid() && booking.ticket_code.is_some() {
                        return Ok((booking, None));
                    }

                    // Claim the transition into PAID. A concurrent duplicate
                    // callback loses this conditional update and takes the
                    // no-op path below.
                    let claimed = BookingEntity::update_many()
                        .col_expr(
                            booking::Column::PaymentStatus,
                            Expr::value(BookingPaymentStatus::Paid.as_str()),
                        )
                        .col_expr(booking::Column::UpdatedAt, Expr::value(Utc::now()))
                        .filter(booking::Column::Id.eq(booking_id))
                        .filter(
                            booking::Column::PaymentStatus
                                .ne(BookingPaymentStatus::Paid.as_str()),
                        )
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    if claimed.rows_affected == 0 {
                        let booking = BookingEntity::find_by_id(booking_id)
                            .one(txn)
                            .await
                            .map_err(ServiceError::db_error)?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!("booking {} not found", booking_id))
                            })?;
                        return Ok((booking, None));
                    }

                    // The reservation runs only on the actual transition into
                    // PAID; SoldOut rolls the whole transaction back.
                    let seat_sequence =
                        inventory.reserve_seat(txn, booking.ticket_type_id).await?;

                    let event = EventEntity::find_by_id(booking.event_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("event {} not found", booking.event_id))
                        })?;
                    let code = ticket_code(&event.title, seat_sequence);

                    let mut active: booking::ActiveModel = booking.into();
                    active.payment_status =
                        Set(BookingPaymentStatus::Paid.as_str().to_string());
                    active.ticket_code = Set(Some(code.clone()));
                    let updated = active.update(txn).await.map_err(ServiceError::db_error)?;

                    Ok((
                        updated,
                        Some(IssuedTicket {
                            seat_sequence,
                            ticket_code: code,
                        }),
                    ))
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(err) => ServiceError::DatabaseError(err),
                TransactionError::Transaction(err) => err,
            })?;

        if let Some(issued) = issued {
            if let Err(e) = self
                .event_sender
                .send(Event::TicketIssued {
                    booking_id: booking.id,
                    ticket_code: issued.ticket_code,
                    seat_sequence: issued.seat_sequence,
                })
                .await
            {
                warn!(booking_id = %booking.id, error = %e, "failed to publish TicketIssued");
            }
        }

        Ok(booking)
    }

    /// Marks a booking FAILED. A late failure for an already-paid booking is
    /// a silent no-op; PAID never regresses.
    #[instrument(skip(self))]
    pub async fn mark_failed(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        self.set_status_unless_paid(booking_id, BookingPaymentStatus::Failed)
            .await
    }

    /// Moves a non-PAID booking back to PENDING so the customer can retry
    /// payment; no-op when already PAID.
    #[instrument(skip(self))]
    pub async fn ensure_pending(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        self.set_status_unless_paid(booking_id, BookingPaymentStatus::Pending)
            .await
    }

    async fn set_status_unless_paid(
        &self,
        booking_id: Uuid,
        status: BookingPaymentStatus,
    ) -> Result<booking::Model, ServiceError> {
        BookingEntity::update_many()
            .col_expr(booking::Column::PaymentStatus, Expr::value(status.as_str()))
            .col_expr(booking::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(booking::Column::Id.eq(booking_id))
            .filter(booking::Column::PaymentStatus.ne(BookingPaymentStatus::Paid.as_str()))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        self.get_booking(booking_id).await
    }
}
