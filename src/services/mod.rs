//! Domain services. Handlers stay thin; state transitions live here.

pub mod bookings;
pub mod inventory;
pub mod payments;

pub use bookings::{ticket_code, BookingService};
pub use inventory::SeatInventoryService;
pub use payments::{CallbackOutcome, PaymentService, PaymentStatusView, StkPushOutcome};
