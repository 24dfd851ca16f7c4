pub mod booking;
pub mod event;
pub mod mpesa_payment;
pub mod ticket_type;

pub use booking::BookingPaymentStatus;
pub use event::{EventStatus, PaymentMethod};
pub use mpesa_payment::PaymentStatus;
