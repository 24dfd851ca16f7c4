use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::services::{CallbackOutcome, StkPushOutcome};
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StkPushRequest {
    pub booking_id: Uuid,
    /// Overrides the phone number captured at booking time
    #[validate(length(min = 9, max = 15))]
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StkPushResponseBody {
    pub booking_id: Uuid,
    pub status: String,
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: Option<String>,
    pub customer_message: Option<String>,
    pub ticket_code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentStatusResponse {
    pub booking_id: Uuid,
    pub payment_status: String,
    pub booking_payment_status: String,
    pub ticket_code: Option<String>,
    pub mpesa_receipt: Option<String>,
}

/// Initiates an M-Pesa STK push for a booking.
#[utoipa::path(
    post,
    path = "/api/v1/payments/stk-push",
    request_body = StkPushRequest,
    responses(
        (status = 200, description = "Push submitted or booking already paid", body = StkPushResponseBody),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Booking not found"),
        (status = 502, description = "Gateway rejected the request")
    ),
    tag = "payments"
)]
pub async fn stk_push(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StkPushRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let outcome = state
        .services
        .payments
        .initiate_stk_push(payload.booking_id, payload.phone_number.as_deref())
        .await?;

    let body = match outcome {
        StkPushOutcome::AlreadyPaid {
            booking_id,
            ticket_code,
        } => StkPushResponseBody {
            booking_id,
            status: "ALREADY_PAID".to_string(),
            merchant_request_id: None,
            checkout_request_id: None,
            customer_message: None,
            ticket_code,
        },
        StkPushOutcome::Initiated {
            booking_id,
            merchant_request_id,
            checkout_request_id,
            customer_message,
        } => StkPushResponseBody {
            booking_id,
            status: "INITIATED".to_string(),
            merchant_request_id,
            checkout_request_id: Some(checkout_request_id),
            customer_message,
            ticket_code: None,
        },
    };

    Ok(Json(body))
}

/// Local status of a push attempt by its checkout request id.
#[utoipa::path(
    get,
    path = "/api/v1/payments/status/{checkout_request_id}",
    params(("checkout_request_id" = String, Path, description = "Daraja checkout request id")),
    responses(
        (status = 200, description = "Payment attempt found", body = PaymentStatusResponse),
        (status = 404, description = "No payment with that checkout request id")
    ),
    tag = "payments"
)]
pub async fn payment_status(
    State(state): State<Arc<AppState>>,
    Path(checkout_request_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let view = state
        .services
        .payments
        .payment_status(&checkout_request_id)
        .await?;

    Ok(Json(PaymentStatusResponse {
        booking_id: view.booking_id,
        payment_status: view.payment_status,
        booking_payment_status: view.booking_payment_status,
        ticket_code: view.ticket_code,
        mpesa_receipt: view.mpesa_receipt,
    }))
}

/// Asks Daraja directly for the state of a push attempt.
#[utoipa::path(
    get,
    path = "/api/v1/payments/query/{checkout_request_id}",
    params(("checkout_request_id" = String, Path, description = "Daraja checkout request id")),
    responses(
        (status = 200, description = "Raw gateway response"),
        (status = 502, description = "Gateway unreachable")
    ),
    tag = "payments"
)]
pub async fn stk_query(
    State(state): State<Arc<AppState>>,
    Path(checkout_request_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let body = state
        .services
        .payments
        .query_gateway(&checkout_request_id)
        .await?;
    Ok(Json(body))
}

/// Receives the Daraja STK callback.
///
/// Always acknowledges with 200 `{"ok": true}` regardless of what the payload
/// contained or whether processing succeeded; anything else makes the gateway
/// redeliver, and redeliveries are already handled by the idempotent
/// processor.
#[utoipa::path(
    post,
    path = "/api/v1/payments/callback",
    responses(
        (status = 200, description = "Callback acknowledged")
    ),
    tag = "payments"
)]
pub async fn stk_callback(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    match state.services.payments.process_callback(&payload).await {
        Ok(CallbackOutcome::Confirmed {
            booking_id,
            ticket_code,
        }) => {
            info!(booking_id = %booking_id, ticket_code = ?ticket_code, "payment confirmed");
        }
        Ok(CallbackOutcome::PaidButUnconfirmed { booking_id }) => {
            warn!(booking_id = %booking_id, "payment settled without a seat; flagged for reconciliation");
        }
        Ok(CallbackOutcome::Failed { booking_id }) => {
            info!(booking_id = %booking_id, "payment failed");
        }
        Ok(CallbackOutcome::Ignored) => {
            info!("callback ignored");
        }
        Err(e) => {
            error!(error = %e, "callback processing error");
        }
    }

    Json(json!({ "ok": true }))
}

pub fn payment_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stk-push", post(stk_push))
        .route("/callback", post(stk_callback))
        .route("/status/:checkout_request_id", get(payment_status))
        .route("/query/:checkout_request_id", get(stk_query))
}
