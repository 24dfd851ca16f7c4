//! HTTP handlers. Thin translation between the wire and the services.

pub mod bookings;
pub mod events;
pub mod payments;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::mpesa::StkGateway;
use crate::services::{BookingService, PaymentService, SeatInventoryService};

pub use crate::AppState;

/// The wired-up service graph shared by every handler.
#[derive(Clone)]
pub struct AppServices {
    pub bookings: BookingService,
    pub payments: PaymentService,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn StkGateway>,
        event_sender: EventSender,
        config: &AppConfig,
    ) -> Self {
        let inventory = SeatInventoryService::new();
        let bookings = BookingService::new(db.clone(), inventory, event_sender.clone());
        let payments = PaymentService::new(
            db,
            gateway,
            bookings.clone(),
            event_sender,
            config.mpesa.clone(),
            config.brand_name.clone(),
        );

        Self { bookings, payments }
    }
}
