//! STK push initiation, status lookup and callback processing.

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::MpesaConfig;
use crate::entities::event::{Entity as EventEntity, PaymentMethod};
use crate::entities::mpesa_payment::{self, Entity as MpesaPaymentEntity, PaymentStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::mpesa::{
    StkCallbackEnvelope, StkGateway, RESULT_CODE_SUCCESS, TRANSACTION_TYPE_PAYBILL,
    TRANSACTION_TYPE_TILL,
};
use crate::services::bookings::BookingService;

/// Result of an STK push initiation request.
#[derive(Debug, Clone)]
pub enum StkPushOutcome {
    /// The booking was already paid; no push was sent.
    AlreadyPaid {
        booking_id: Uuid,
        ticket_code: Option<String>,
    },
    /// A push was submitted and is awaiting the customer's PIN.
    Initiated {
        booking_id: Uuid,
        merchant_request_id: Option<String>,
        checkout_request_id: String,
        customer_message: Option<String>,
    },
}

/// Result of processing one gateway callback delivery.
///
/// Every variant is acknowledged to the gateway the same way; the distinction
/// exists for logging and for tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Malformed payload, unknown correlation id, or a duplicate that
    /// changed nothing worth acting on.
    Ignored,
    /// The payment settled and the booking is confirmed with a ticket.
    Confirmed {
        booking_id: Uuid,
        ticket_code: Option<String>,
    },
    /// The payment settled but every seat was gone by confirmation time.
    PaidButUnconfirmed { booking_id: Uuid },
    /// The customer cancelled or the payment failed at the gateway.
    Failed { booking_id: Uuid },
}

/// Point-in-time view of a payment attempt, keyed by checkout request id.
#[derive(Debug, Clone)]
pub struct PaymentStatusView {
    pub booking_id: Uuid,
    pub payment_status: String,
    pub booking_payment_status: String,
    pub ticket_code: Option<String>,
    pub mpesa_receipt: Option<String>,
}

/// Service owning the `mpesa_payments` table and the gateway conversation.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn StkGateway>,
    bookings: BookingService,
    event_sender: EventSender,
    mpesa: MpesaConfig,
    brand_name: String,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn StkGateway>,
        bookings: BookingService,
        event_sender: EventSender,
        mpesa: MpesaConfig,
        brand_name: String,
    ) -> Self {
        Self {
            db,
            gateway,
            bookings,
            event_sender,
            mpesa,
            brand_name,
        }
    }

    /// Sends an STK push for a booking and records the attempt.
    ///
    /// A retry for the same booking overwrites the existing payment row with
    /// fresh correlation ids, so only the newest push can confirm it.
    #[instrument(skip(self, phone_override))]
    pub async fn initiate_stk_push(
        &self,
        booking_id: Uuid,
        phone_override: Option<&str>,
    ) -> Result<StkPushOutcome, ServiceError> {
        let booking = self.bookings.get_booking(booking_id).await?;
        if booking.is_paid() {
            return Ok(StkPushOutcome::AlreadyPaid {
                booking_id: booking.id,
                ticket_code: booking.ticket_code,
            });
        }

        // A previously failed booking moves back to PENDING for the retry.
        let booking = self.bookings.ensure_pending(booking_id).await?;

        let event = EventEntity::find_by_id(booking.event_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("event {} not found", booking.event_id))
            })?;
        let ticket = crate::entities::ticket_type::Entity::find_by_id(booking.ticket_type_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "ticket type {} not found",
                    booking.ticket_type_id
                ))
            })?;

        let phone = crate::mpesa::phone::normalize(
            phone_override.unwrap_or(booking.phone_number.as_str()),
        );

        // Daraja takes whole shillings.
        let amount = ticket
            .price
            .round()
            .to_u32()
            .filter(|a| *a >= 1)
            .ok_or_else(|| {
                ServiceError::BadRequest(format!(
                    "ticket price {} is not chargeable via STK push",
                    ticket.price
                ))
            })?;

        let shortcode = event
            .payment_number
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(self.mpesa.shortcode.as_str())
            .to_string();
        let transaction_type = match self.mpesa.transaction_type.as_deref() {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => match PaymentMethod::from_str(&event.payment_method) {
                Some(PaymentMethod::Till) => TRANSACTION_TYPE_TILL.to_string(),
                _ => TRANSACTION_TYPE_PAYBILL.to_string(),
            },
        };
        let party_b = self
            .mpesa
            .party_b
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(shortcode.as_str())
            .to_string();

        // AccountReference is capped at 12 characters by Daraja.
        let account_reference = format!("BK-{}", &booking.id.simple().to_string()[..8]);
        let transaction_desc = format!("{} - {}", self.brand_name, event.title);

        let token = self.gateway.access_token().await?;
        let response = self
            .gateway
            .stk_push(
                &token,
                &phone,
                amount,
                &shortcode,
                &party_b,
                &transaction_type,
                &account_reference,
                &transaction_desc,
            )
            .await?;

        let checkout_request_id = response
            .checkout_request_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ServiceError::GatewayError(format!(
                    "gateway accepted the push but returned no CheckoutRequestID: {:?}",
                    response.response_description
                ))
            })?;

        self.upsert_payment(
            booking.id,
            &phone,
            ticket.price,
            response.merchant_request_id.clone(),
            &checkout_request_id,
        )
        .await?;

        if let Err(e) = self
            .event_sender
            .send(Event::StkPushInitiated {
                booking_id: booking.id,
                checkout_request_id: checkout_request_id.clone(),
            })
            .await
        {
            warn!(booking_id = %booking.id, error = %e, "failed to publish StkPushInitiated");
        }

        Ok(StkPushOutcome::Initiated {
            booking_id: booking.id,
            merchant_request_id: response.merchant_request_id,
            checkout_request_id,
            customer_message: response.customer_message,
        })
    }

    /// Looks up a payment attempt and its booking by checkout request id.
    #[instrument(skip(self))]
    pub async fn payment_status(
        &self,
        checkout_request_id: &str,
    ) -> Result<PaymentStatusView, ServiceError> {
        let payment = self
            .find_by_checkout_request_id(checkout_request_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "no payment with checkout request id {}",
                    checkout_request_id
                ))
            })?;
        let booking = self.bookings.get_booking(payment.booking_id).await?;

        Ok(PaymentStatusView {
            booking_id: booking.id,
            payment_status: payment.status,
            booking_payment_status: booking.payment_status,
            ticket_code: booking.ticket_code,
            mpesa_receipt: payment.mpesa_receipt,
        })
    }

    /// Asks the gateway directly for the state of a push attempt; a plain
    /// passthrough of Daraja's response body.
    #[instrument(skip(self))]
    pub async fn query_gateway(&self, checkout_request_id: &str) -> Result<Value, ServiceError> {
        let token = self.gateway.access_token().await?;
        self.gateway.stk_query(&token, checkout_request_id).await
    }

    /// Processes one callback delivery from the gateway.
    ///
    /// Safe to call any number of times with the same payload: the booking
    /// confirmation path is idempotent and a failure report can never undo a
    /// settled payment.
    #[instrument(skip(self, payload))]
    pub async fn process_callback(&self, payload: &Value) -> Result<CallbackOutcome, ServiceError> {
        let envelope = StkCallbackEnvelope::from_value(payload);
        let stk = match envelope.stk() {
            Some(stk) => stk,
            None => {
                info!("callback payload carries no stkCallback body; acknowledging and ignoring");
                return Ok(CallbackOutcome::Ignored);
            }
        };

        let checkout_request_id = match stk.checkout_request_id.as_deref().filter(|s| !s.is_empty())
        {
            Some(id) => id,
            None => {
                info!("callback carries no CheckoutRequestID; acknowledging and ignoring");
                return Ok(CallbackOutcome::Ignored);
            }
        };

        let payment = match self.find_by_checkout_request_id(checkout_request_id).await? {
            Some(payment) => payment,
            None => {
                info!(
                    checkout_request_id = %checkout_request_id,
                    "callback for unknown or superseded checkout request id; ignoring"
                );
                return Ok(CallbackOutcome::Ignored);
            }
        };

        if stk.result_code == Some(RESULT_CODE_SUCCESS) {
            self.handle_success(payment, stk.receipt_number(), payload)
                .await
        } else {
            self.handle_failure(payment, stk.result_code.unwrap_or(-1), payload)
                .await
        }
    }

    async fn handle_success(
        &self,
        payment: mpesa_payment::Model,
        receipt: Option<String>,
        payload: &Value,
    ) -> Result<CallbackOutcome, ServiceError> {
        let booking_id = payment.booking_id;

        // The payment row records PAID before the booking is confirmed, so
        // settlement is never lost even if confirmation below cannot finish.
        let mut active: mpesa_payment::ActiveModel = payment.into();
        active.status = Set(PaymentStatus::Paid.as_str().to_string());
        active.mpesa_receipt = Set(receipt.clone());
        active.raw_callback = Set(Some(payload.to_string()));
        active.update(&*self.db).await.map_err(ServiceError::db_error)?;

        if let Err(e) = self
            .event_sender
            .send(Event::PaymentConfirmed {
                booking_id,
                receipt,
            })
            .await
        {
            warn!(booking_id = %booking_id, error = %e, "failed to publish PaymentConfirmed");
        }

        match self.bookings.confirm_paid(booking_id).await {
            Ok(booking) => Ok(CallbackOutcome::Confirmed {
                booking_id: booking.id,
                ticket_code: booking.ticket_code,
            }),
            Err(ServiceError::SoldOut(msg)) => {
                error!(
                    booking_id = %booking_id,
                    "payment settled but confirmation found no seats: {}", msg
                );
                let ticket_type_id = self
                    .bookings
                    .get_booking(booking_id)
                    .await
                    .map(|b| b.ticket_type_id)
                    .unwrap_or_default();
                if let Err(e) = self
                    .event_sender
                    .send(Event::SeatCapacityConflict {
                        booking_id,
                        ticket_type_id,
                    })
                    .await
                {
                    warn!(booking_id = %booking_id, error = %e, "failed to publish SeatCapacityConflict");
                }
                Ok(CallbackOutcome::PaidButUnconfirmed { booking_id })
            }
            Err(e) => Err(e),
        }
    }

    async fn handle_failure(
        &self,
        payment: mpesa_payment::Model,
        result_code: i64,
        payload: &Value,
    ) -> Result<CallbackOutcome, ServiceError> {
        let booking_id = payment.booking_id;
        let already_settled = payment.status == PaymentStatus::Paid.as_str();

        // The raw payload is kept for audit even when nothing else changes.
        let mut active: mpesa_payment::ActiveModel = payment.into();
        active.raw_callback = Set(Some(payload.to_string()));

        // A settled payment is terminal; a late failure report cannot
        // regress it.
        if already_settled {
            active.update(&*self.db).await.map_err(ServiceError::db_error)?;
            info!(
                booking_id = %booking_id,
                "failure callback for an already-settled payment; ignoring"
            );
            return Ok(CallbackOutcome::Ignored);
        }

        active.status = Set(PaymentStatus::Failed.as_str().to_string());
        active.update(&*self.db).await.map_err(ServiceError::db_error)?;

        self.bookings.mark_failed(booking_id).await?;

        if let Err(e) = self
            .event_sender
            .send(Event::PaymentFailed {
                booking_id,
                result_code,
            })
            .await
        {
            warn!(booking_id = %booking_id, error = %e, "failed to publish PaymentFailed");
        }

        Ok(CallbackOutcome::Failed { booking_id })
    }

    async fn find_by_checkout_request_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<mpesa_payment::Model>, ServiceError> {
        MpesaPaymentEntity::find()
            .filter(mpesa_payment::Column::CheckoutRequestId.eq(checkout_request_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    async fn upsert_payment(
        &self,
        booking_id: Uuid,
        phone: &str,
        amount: rust_decimal::Decimal,
        merchant_request_id: Option<String>,
        checkout_request_id: &str,
    ) -> Result<mpesa_payment::Model, ServiceError> {
        let existing = MpesaPaymentEntity::find()
            .filter(mpesa_payment::Column::BookingId.eq(booking_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        match existing {
            Some(payment) => {
                // A retry must not clobber a payment that settled while the
                // new push was in flight at the gateway; the guard keeps the
                // settled row and its receipt.
                let refreshed = MpesaPaymentEntity::update_many()
                    .col_expr(mpesa_payment::Column::Phone, Expr::value(phone))
                    .col_expr(mpesa_payment::Column::Amount, Expr::value(amount))
                    .col_expr(
                        mpesa_payment::Column::MerchantRequestId,
                        Expr::value(merchant_request_id),
                    )
                    .col_expr(
                        mpesa_payment::Column::CheckoutRequestId,
                        Expr::value(checkout_request_id),
                    )
                    .col_expr(
                        mpesa_payment::Column::MpesaReceipt,
                        Expr::value(Option::<String>::None),
                    )
                    .col_expr(
                        mpesa_payment::Column::Status,
                        Expr::value(PaymentStatus::Pending.as_str()),
                    )
                    .col_expr(
                        mpesa_payment::Column::RawCallback,
                        Expr::value(Option::<String>::None),
                    )
                    .col_expr(mpesa_payment::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(mpesa_payment::Column::Id.eq(payment.id))
                    .filter(
                        mpesa_payment::Column::Status.ne(PaymentStatus::Paid.as_str()),
                    )
                    .exec(&*self.db)
                    .await
                    .map_err(ServiceError::db_error)?;

                if refreshed.rows_affected == 0 {
                    info!(
                        booking_id = %booking_id,
                        "payment settled during retry; keeping the settled row"
                    );
                }

                MpesaPaymentEntity::find_by_id(payment.id)
                    .one(&*self.db)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("payment {} not found", payment.id))
                    })
            }
            None => {
                let active = mpesa_payment::ActiveModel {
                    booking_id: Set(booking_id),
                    phone: Set(phone.to_string()),
                    amount: Set(amount),
                    merchant_request_id: Set(merchant_request_id),
                    checkout_request_id: Set(checkout_request_id.to_string()),
                    mpesa_receipt: Set(None),
                    status: Set(PaymentStatus::Pending.as_str().to_string()),
                    raw_callback: Set(None),
                    ..Default::default()
                };
                active.insert(&*self.db).await.map_err(ServiceError::db_error)
            }
        }
    }
}
