//! M-Pesa (Daraja) integration: gateway client, callback payload decoding,
//! and phone normalization.

pub mod callback;
pub mod client;
pub mod phone;

pub use callback::{StkCallback, StkCallbackEnvelope, RESULT_CODE_SUCCESS};
pub use client::{
    DarajaClient, StkGateway, StkPushResponse, TRANSACTION_TYPE_PAYBILL, TRANSACTION_TYPE_TILL,
};
