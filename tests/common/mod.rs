//! Shared fixtures for the integration tests: an in-memory database, a seeded
//! event, and a scripted gateway that never touches the network.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use tikiti_api::config::AppConfig;
use tikiti_api::db::{establish_connection_with_config, run_migrations, DbConfig, DbPool};
use tikiti_api::entities::{event, ticket_type};
use tikiti_api::errors::ServiceError;
use tikiti_api::events::{process_events, EventSender};
use tikiti_api::handlers::AppServices;
use tikiti_api::mpesa::{StkGateway, StkPushResponse};
use tikiti_api::services::StkPushOutcome;

pub const EVENT_TITLE: &str = "World Rally Championship";
pub const TILL_NUMBER: &str = "7821537";

/// Gateway double handing out sequential checkout request ids.
pub struct MockGateway {
    counter: AtomicUsize,
    omit_checkout_id: AtomicBool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
            omit_checkout_id: AtomicBool::new(false),
        }
    }

    pub fn pushes_sent(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    /// Makes subsequent pushes come back accepted but without a
    /// CheckoutRequestID, as Daraja error responses do.
    pub fn omit_checkout_ids(&self) {
        self.omit_checkout_id.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl StkGateway for MockGateway {
    async fn access_token(&self) -> Result<String, ServiceError> {
        Ok("test-token".to_string())
    }

    async fn stk_push(
        &self,
        _access_token: &str,
        _phone_254: &str,
        _amount: u32,
        _business_short_code: &str,
        _party_b: &str,
        _transaction_type: &str,
        _account_reference: &str,
        _transaction_desc: &str,
    ) -> Result<StkPushResponse, ServiceError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        if self.omit_checkout_id.load(Ordering::SeqCst) {
            return Ok(StkPushResponse {
                response_description: Some("Invalid CallBackURL".to_string()),
                ..StkPushResponse::default()
            });
        }
        Ok(StkPushResponse {
            merchant_request_id: Some(format!("29115-34620561-{}", n)),
            checkout_request_id: Some(format!("ws_CO_TEST_{}", n)),
            response_code: Some("0".to_string()),
            response_description: Some("Success. Request accepted for processing".to_string()),
            customer_message: Some("Success. Request accepted for processing".to_string()),
        })
    }

    async fn stk_query(
        &self,
        _access_token: &str,
        checkout_request_id: &str,
    ) -> Result<Value, ServiceError> {
        Ok(json!({
            "CheckoutRequestID": checkout_request_id,
            "ResultCode": "0",
            "ResultDesc": "The service request is processed successfully."
        }))
    }
}

pub struct TestContext {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    pub gateway: Arc<MockGateway>,
    pub event_sender: EventSender,
    pub event_id: Uuid,
    pub ticket_type_id: Uuid,
}

impl TestContext {
    /// Fresh in-memory database with one TILL-paid event and a single ticket
    /// type of the given capacity.
    pub async fn new(capacity: i32) -> Self {
        // One pooled connection so every query sees the same :memory: db.
        let db_config = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            idle_timeout: Duration::from_secs(600),
            ..Default::default()
        };
        let db = Arc::new(
            establish_connection_with_config(&db_config)
                .await
                .expect("connect to sqlite"),
        );
        run_migrations(&db).await.expect("run migrations");

        let seeded_event = event::ActiveModel {
            title: Set(EVENT_TITLE.to_string()),
            description: Set(Some("Rally weekend".to_string())),
            date: Set(NaiveDate::from_ymd_opt(2026, 10, 3).unwrap()),
            time: Set(NaiveTime::from_hms_opt(18, 0, 0).unwrap()),
            location: Set(Some("Naivasha".to_string())),
            status: Set(event::EventStatus::Upcoming.as_str().to_string()),
            payment_method: Set(event::PaymentMethod::Till.as_str().to_string()),
            payment_number: Set(Some(TILL_NUMBER.to_string())),
            ..Default::default()
        };
        let seeded_event = seeded_event.insert(&*db).await.expect("seed event");

        let seeded_ticket = ticket_type::ActiveModel {
            event_id: Set(seeded_event.id),
            name: Set("Regular".to_string()),
            price: Set(dec!(1500)),
            capacity: Set(capacity),
            sold: Set(0),
            ..Default::default()
        };
        let seeded_ticket = seeded_ticket.insert(&*db).await.expect("seed ticket type");

        let (tx, rx) = mpsc::channel(1000);
        let event_sender = EventSender::new(tx);
        tokio::spawn(process_events(rx));

        let config = AppConfig::new("sqlite::memory:", "127.0.0.1", 0, "test");
        let gateway = Arc::new(MockGateway::new());
        let services = AppServices::new(
            db.clone(),
            gateway.clone(),
            event_sender.clone(),
            &config,
        );

        Self {
            db,
            services,
            gateway,
            event_sender,
            event_id: seeded_event.id,
            ticket_type_id: seeded_ticket.id,
        }
    }

    pub async fn create_booking(&self, name: &str, phone: &str) -> Uuid {
        self.services
            .bookings
            .create_booking(name, phone, self.event_id, self.ticket_type_id)
            .await
            .expect("create booking")
            .id
    }

    /// Initiates a push and returns the checkout request id handed out by the
    /// mock gateway.
    pub async fn push(&self, booking_id: Uuid) -> String {
        match self
            .services
            .payments
            .initiate_stk_push(booking_id, None)
            .await
            .expect("stk push")
        {
            StkPushOutcome::Initiated {
                checkout_request_id,
                ..
            } => checkout_request_id,
            other => panic!("expected an initiated push, got {:?}", other),
        }
    }
}

pub fn success_callback(checkout_request_id: &str, receipt: &str) -> Value {
    json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": checkout_request_id,
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": {
                    "Item": [
                        { "Name": "Amount", "Value": 1500.00 },
                        { "Name": "MpesaReceiptNumber", "Value": receipt },
                        { "Name": "TransactionDate", "Value": 20260829121530u64 },
                        { "Name": "PhoneNumber", "Value": 254712345678u64 }
                    ]
                }
            }
        }
    })
}

pub fn failure_callback(checkout_request_id: &str, result_code: i64) -> Value {
    json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": checkout_request_id,
                "ResultCode": result_code,
                "ResultDesc": "Request cancelled by user"
            }
        }
    })
}
