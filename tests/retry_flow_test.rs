mod common;

use assert_matches::assert_matches;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use common::{failure_callback, success_callback, TestContext};
use tikiti_api::entities::mpesa_payment;
use tikiti_api::services::{CallbackOutcome, StkPushOutcome};

/// A cancelled push can be retried; the retry reuses the booking's single
/// payment row and only the newest checkout request id can confirm it.
#[tokio::test]
async fn retry_overwrites_the_payment_row_and_supersedes_the_old_push() {
    let ctx = TestContext::new(5).await;
    let booking_id = ctx.create_booking("Wanjiku", "0712345678").await;

    let first_checkout = ctx.push(booking_id).await;
    ctx.services
        .payments
        .process_callback(&failure_callback(&first_checkout, 1032))
        .await
        .unwrap();

    let booking = ctx.services.bookings.get_booking(booking_id).await.unwrap();
    assert_eq!(booking.payment_status, "FAILED");

    let second_checkout = ctx.push(booking_id).await;
    assert_ne!(first_checkout, second_checkout);

    // The retry moved the booking back to PENDING and reset the attempt.
    let booking = ctx.services.bookings.get_booking(booking_id).await.unwrap();
    assert_eq!(booking.payment_status, "PENDING");

    let payments = mpesa_payment::Entity::find().all(&*ctx.db).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].checkout_request_id, second_checkout);
    assert_eq!(payments[0].status, "PENDING");
    assert_eq!(payments[0].mpesa_receipt, None);
    assert_eq!(payments[0].raw_callback, None);

    // A late callback for the superseded push misses the lookup.
    let outcome = ctx
        .services
        .payments
        .process_callback(&success_callback(&first_checkout, "STALE0001"))
        .await
        .unwrap();
    assert_eq!(outcome, CallbackOutcome::Ignored);

    let outcome = ctx
        .services
        .payments
        .process_callback(&success_callback(&second_checkout, "NLJ7RT61SV"))
        .await
        .unwrap();
    assert_matches!(outcome, CallbackOutcome::Confirmed { .. });

    let payments = mpesa_payment::Entity::find().all(&*ctx.db).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, "PAID");
    assert_eq!(payments[0].mpesa_receipt.as_deref(), Some("NLJ7RT61SV"));
}

/// Pushing for a booking that is already paid sends nothing to the gateway.
#[tokio::test]
async fn push_for_a_paid_booking_short_circuits() {
    let ctx = TestContext::new(5).await;
    let booking_id = ctx.create_booking("Wanjiku", "0712345678").await;
    let checkout_id = ctx.push(booking_id).await;
    ctx.services
        .payments
        .process_callback(&success_callback(&checkout_id, "NLJ7RT61SV"))
        .await
        .unwrap();

    let sent_before = ctx.gateway.pushes_sent();
    let outcome = ctx
        .services
        .payments
        .initiate_stk_push(booking_id, None)
        .await
        .unwrap();

    assert_matches!(
        outcome,
        StkPushOutcome::AlreadyPaid { ticket_code: Some(ref code), .. } if code == "WRC-001"
    );
    assert_eq!(ctx.gateway.pushes_sent(), sent_before);
}

/// An accepted push whose response carries no CheckoutRequestID cannot be
/// correlated with a callback, so it is surfaced as a gateway error and
/// nothing is recorded; the booking stays PENDING for another attempt.
#[tokio::test]
async fn push_response_without_checkout_id_is_a_gateway_error() {
    let ctx = TestContext::new(5).await;
    let booking_id = ctx.create_booking("Wanjiku", "0712345678").await;
    ctx.gateway.omit_checkout_ids();

    let err = ctx
        .services
        .payments
        .initiate_stk_push(booking_id, None)
        .await
        .unwrap_err();
    assert_matches!(err, tikiti_api::errors::ServiceError::GatewayError(_));

    let booking = ctx.services.bookings.get_booking(booking_id).await.unwrap();
    assert_eq!(booking.payment_status, "PENDING");

    let payments = mpesa_payment::Entity::find().all(&*ctx.db).await.unwrap();
    assert!(payments.is_empty());
}

/// A retry racing a settlement must not clobber the settled payment row.
/// Seeding one seat and paying two bookings leaves the second with a PAID
/// payment but an unconfirmed booking; a fresh push for it keeps the settled
/// row and its receipt.
#[tokio::test]
async fn retry_keeps_a_payment_row_that_settled_in_the_meantime() {
    let ctx = TestContext::new(1).await;
    let first = ctx.create_booking("Wanjiku", "0712345678").await;
    let second = ctx.create_booking("Otieno", "0798765432").await;
    let first_checkout = ctx.push(first).await;
    let second_checkout = ctx.push(second).await;

    ctx.services
        .payments
        .process_callback(&success_callback(&first_checkout, "NLJ7RT61SV"))
        .await
        .unwrap();
    let outcome = ctx
        .services
        .payments
        .process_callback(&success_callback(&second_checkout, "NLJ7RT62AA"))
        .await
        .unwrap();
    assert_eq!(outcome, CallbackOutcome::PaidButUnconfirmed { booking_id: second });

    // The booking is not PAID, so a new push goes out, but the settled row
    // must survive it.
    ctx.push(second).await;

    let payment = mpesa_payment::Entity::find()
        .filter(mpesa_payment::Column::BookingId.eq(second))
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, "PAID");
    assert_eq!(payment.checkout_request_id, second_checkout);
    assert_eq!(payment.mpesa_receipt.as_deref(), Some("NLJ7RT62AA"));
}

/// An unknown booking id is a 404, not a gateway call.
#[tokio::test]
async fn push_for_an_unknown_booking_is_not_found() {
    let ctx = TestContext::new(5).await;

    let err = ctx
        .services
        .payments
        .initiate_stk_push(uuid::Uuid::new_v4(), None)
        .await
        .unwrap_err();
    assert_matches!(err, tikiti_api::errors::ServiceError::NotFound(_));
    assert_eq!(ctx.gateway.pushes_sent(), 0);
}
