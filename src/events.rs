use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Domain events emitted by the booking and payment services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    BookingCreated(Uuid),
    StkPushInitiated {
        booking_id: Uuid,
        checkout_request_id: String,
    },
    PaymentConfirmed {
        booking_id: Uuid,
        receipt: Option<String>,
    },
    PaymentFailed {
        booking_id: Uuid,
        result_code: i64,
    },
    TicketIssued {
        booking_id: Uuid,
        ticket_code: String,
        seat_sequence: i32,
    },
    /// A payment settled but the seat reservation found no capacity left.
    /// Money has moved and inventory cannot honor it; operators must act.
    SeatCapacityConflict {
        booking_id: Uuid,
        ticket_type_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel, surfacing each event on the log.
///
/// Spawned once at startup; runs until every sender is dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::SeatCapacityConflict {
                booking_id,
                ticket_type_id,
            } => {
                error!(
                    booking_id = %booking_id,
                    ticket_type_id = %ticket_type_id,
                    "payment settled but no seats remain; manual reconciliation required"
                );
            }
            Event::PaymentFailed {
                booking_id,
                result_code,
            } => {
                warn!(
                    booking_id = %booking_id,
                    result_code = result_code,
                    "payment attempt failed"
                );
            }
            other => {
                info!(event = ?other, "domain event");
            }
        }
    }
}
