mod common;

use sea_orm::EntityTrait;

use common::{success_callback, TestContext};
use tikiti_api::entities::ticket_type;
use tikiti_api::services::CallbackOutcome;

/// Twenty settled payments race for ten seats; exactly ten may confirm.
#[tokio::test]
async fn oversubscribed_callbacks_confirm_exactly_capacity() {
    let capacity = 10;
    let ctx = TestContext::new(capacity).await;

    let mut checkout_ids = Vec::new();
    for i in 0..20 {
        let booking_id = ctx
            .create_booking(&format!("Customer {}", i), "0712345678")
            .await;
        checkout_ids.push(ctx.push(booking_id).await);
    }

    let mut handles = Vec::new();
    for (i, checkout_id) in checkout_ids.into_iter().enumerate() {
        let payments = ctx.services.payments.clone();
        handles.push(tokio::spawn(async move {
            payments
                .process_callback(&success_callback(&checkout_id, &format!("RCPT{:04}", i)))
                .await
        }));
    }

    let mut confirmed = 0;
    let mut unconfirmed = 0;
    for result in futures::future::join_all(handles).await {
        match result.unwrap().unwrap() {
            CallbackOutcome::Confirmed { ticket_code, .. } => {
                assert!(ticket_code.is_some());
                confirmed += 1;
            }
            CallbackOutcome::PaidButUnconfirmed { .. } => unconfirmed += 1,
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    assert_eq!(confirmed, capacity);
    assert_eq!(unconfirmed, 20 - capacity);

    let ticket = ticket_type::Entity::find_by_id(ctx.ticket_type_id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ticket.sold, capacity);
}

/// The same delivery arriving on several connections at once still counts
/// one seat and issues one code.
#[tokio::test]
async fn concurrent_duplicate_deliveries_count_one_seat() {
    let ctx = TestContext::new(5).await;
    let booking_id = ctx.create_booking("Wanjiku", "0712345678").await;
    let checkout_id = ctx.push(booking_id).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let payments = ctx.services.payments.clone();
        let payload = success_callback(&checkout_id, "NLJ7RT61SV");
        handles.push(tokio::spawn(
            async move { payments.process_callback(&payload).await },
        ));
    }

    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(
            outcome,
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

/// Distinct confirmations get distinct, sequential seat numbers in their
/// ticket codes.
#[tokio::test]
async fn ticket_codes_are_unique_per_confirmation() {
    let ctx = TestContext::new(5).await;

    let mut codes = Vec::new();
    for i in 0..3 {
        let booking_id = ctx
            .create_booking(&format!("Customer {}", i), "0712345678")
            .await;
        let checkout_id = ctx.push(booking_id).await;
        ctx.services
            .payments
            .process_callback(&success_callback(&checkout_id, &format!("RCPT{:04}", i)))
            .await
            .unwrap();
        let booking = ctx.services.bookings.get_booking(booking_id).await.unwrap();
        codes.push(booking.ticket_code.unwrap());
    }

    assert_eq!(codes, vec!["WRC-001", "WRC-002", "WRC-003"]);
}
