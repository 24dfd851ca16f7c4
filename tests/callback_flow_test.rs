mod common;

use assert_matches::assert_matches;
use sea_orm::EntityTrait;
use serde_json::json;

use common::{failure_callback, success_callback, TestContext};
use tikiti_api::entities::{mpesa_payment, ticket_type};
use tikiti_api::services::CallbackOutcome;

#[tokio::test]
async fn success_callback_confirms_booking_and_issues_ticket() {
    let ctx = TestContext::new(5).await;
    let booking_id = ctx.create_booking("Wanjiku", "0712345678").await;
    let checkout_id = ctx.push(booking_id).await;

    let outcome = ctx
        .services
        .payments
        .process_callback(&success_callback(&checkout_id, "NLJ7RT61SV"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        CallbackOutcome::Confirmed {
            booking_id,
            ticket_code: Some("WRC-001".to_string()),
        }
    );

    let booking = ctx.services.bookings.get_booking(booking_id).await.unwrap();
    assert!(booking.is_paid());
    assert_eq!(booking.ticket_code.as_deref(), Some("WRC-001"));

    let ticket = ticket_type::Entity::find_by_id(ctx.ticket_type_id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ticket.sold, 1);

    let payment = mpesa_payment::Entity::find()
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, "PAID");
    assert_eq!(payment.mpesa_receipt.as_deref(), Some("NLJ7RT61SV"));
    assert!(payment.raw_callback.is_some());
}

#[tokio::test]
async fn duplicate_success_callbacks_do_not_double_count_seats() {
    let ctx = TestContext::new(5).await;
    let booking_id = ctx.create_booking("Wanjiku", "0712345678").await;
    let checkout_id = ctx.push(booking_id).await;
    let payload = success_callback(&checkout_id, "NLJ7RT61SV");

    let mut outcomes = Vec::new();
    for _ in 0..3 {
        outcomes.push(ctx.services.payments.process_callback(&payload).await.unwrap());
    }

    for outcome in &outcomes {
        assert_eq!(
            *outcome,
            CallbackOutcome::Confirmed {
                booking_id,
                ticket_code: Some("WRC-001".to_string()),
            }
        );
    }

    let ticket = ticket_type::Entity::find_by_id(ctx.ticket_type_id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ticket.sold, 1);
}

#[tokio::test]
async fn failure_callback_marks_booking_failed() {
    let ctx = TestContext::new(5).await;
    let booking_id = ctx.create_booking("Otieno", "254701234567").await;
    let checkout_id = ctx.push(booking_id).await;

    let outcome = ctx
        .services
        .payments
        .process_callback(&failure_callback(&checkout_id, 1032))
        .await
        .unwrap();

    assert_eq!(outcome, CallbackOutcome::Failed { booking_id });

    let booking = ctx.services.bookings.get_booking(booking_id).await.unwrap();
    assert_eq!(booking.payment_status, "FAILED");
    assert!(booking.ticket_code.is_none());

    let ticket = ticket_type::Entity::find_by_id(ctx.ticket_type_id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ticket.sold, 0);
}

#[tokio::test]
async fn late_failure_cannot_regress_a_paid_booking() {
    let ctx = TestContext::new(5).await;
    let booking_id = ctx.create_booking("Wanjiku", "0712345678").await;
    let checkout_id = ctx.push(booking_id).await;

    ctx.services
        .payments
        .process_callback(&success_callback(&checkout_id, "NLJ7RT61SV"))
        .await
        .unwrap();

    let outcome = ctx
        .services
        .payments
        .process_callback(&failure_callback(&checkout_id, 1))
        .await
        .unwrap();
    assert_eq!(outcome, CallbackOutcome::Ignored);

    let booking = ctx.services.bookings.get_booking(booking_id).await.unwrap();
    assert!(booking.is_paid());
    assert_eq!(booking.ticket_code.as_deref(), Some("WRC-001"));

    let payment = mpesa_payment::Entity::find()
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, "PAID");
    assert_eq!(payment.mpesa_receipt.as_deref(), Some("NLJ7RT61SV"));

    // The late delivery is still kept on the audit trail.
    assert!(payment
        .raw_callback
        .as_deref()
        .unwrap()
        .contains("Request cancelled by user"));
}

#[tokio::test]
async fn unknown_checkout_request_id_is_acknowledged_and_ignored() {
    let ctx = TestContext::new(5).await;

    let outcome = ctx
        .services
        .payments
        .process_callback(&success_callback("ws_CO_NEVER_SEEN", "NLJ7RT61SV"))
        .await
        .unwrap();

    assert_eq!(outcome, CallbackOutcome::Ignored);
}

#[tokio::test]
async fn malformed_payloads_are_acknowledged_and_ignored() {
    let ctx = TestContext::new(5).await;

    for payload in [
        json!({}),
        json!({"Body": {}}),
        json!({"unexpected": ["shape"]}),
        json!("just a string"),
        json!({"Body": {"stkCallback": {"ResultCode": 0}}}),
    ] {
        let outcome = ctx.services.payments.process_callback(&payload).await.unwrap();
        assert_eq!(outcome, CallbackOutcome::Ignored, "payload: {}", payload);
    }
}

#[tokio::test]
async fn success_without_metadata_confirms_with_no_receipt() {
    let ctx = TestContext::new(5).await;
    let booking_id = ctx.create_booking("Wanjiku", "0712345678").await;
    let checkout_id = ctx.push(booking_id).await;

    let payload = json!({
        "Body": { "stkCallback": {
            "CheckoutRequestID": checkout_id,
            "ResultCode": 0,
            "ResultDesc": "ok"
        }}
    });

    let outcome = ctx.services.payments.process_callback(&payload).await.unwrap();
    assert_matches!(outcome, CallbackOutcome::Confirmed { .. });

    let payment = mpesa_payment::Entity::find()
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, "PAID");
    assert_eq!(payment.mpesa_receipt, None);
}

#[tokio::test]
async fn sold_out_at_confirmation_reports_paid_but_unconfirmed() {
    let ctx = TestContext::new(1).await;
    let first = ctx.create_booking("Wanjiku", "0712345678").await;
    let second = ctx.create_booking("Otieno", "0798765432").await;
    let first_checkout = ctx.push(first).await;
    let second_checkout = ctx.push(second).await;

    let outcome = ctx
        .services
        .payments
        .process_callback(&success_callback(&first_checkout, "NLJ7RT61SV"))
        .await
        .unwrap();
    assert_matches!(outcome, CallbackOutcome::Confirmed { .. });

    let outcome = ctx
        .services
        .payments
        .process_callback(&success_callback(&second_checkout, "NLJ7RT62AA"))
        .await
        .unwrap();
    assert_eq!(outcome, CallbackOutcome::PaidButUnconfirmed { booking_id: second });

    // The money is recorded; the booking itself never reached PAID.
    let booking = ctx.services.bookings.get_booking(second).await.unwrap();
    assert!(!booking.is_paid());
    assert!(booking.ticket_code.is_none());

    let ticket = ticket_type::Entity::find_by_id(ctx.ticket_type_id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ticket.sold, 1);
}

#[tokio::test]
async fn payment_status_reflects_the_confirmed_booking() {
    let ctx = TestContext::new(5).await;
    let booking_id = ctx.create_booking("Wanjiku", "0712345678").await;
    let checkout_id = ctx.push(booking_id).await;

    ctx.services
        .payments
        .process_callback(&success_callback(&checkout_id, "NLJ7RT61SV"))
        .await
        .unwrap();

    let view = ctx
        .services
        .payments
        .payment_status(&checkout_id)
        .await
        .unwrap();
    assert_eq!(view.booking_id, booking_id);
    assert_eq!(view.payment_status, "PAID");
    assert_eq!(view.booking_payment_status, "PAID");
    assert_eq!(view.ticket_code.as_deref(), Some("WRC-001"));
    assert_eq!(view.mpesa_receipt.as_deref(), Some("NLJ7RT61SV"));
}
