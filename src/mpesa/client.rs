//! Daraja (M-Pesa) gateway client.
//!
//! Network calls here are plain HTTP round-trips; callers must never invoke
//! them while holding a database transaction or lock.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Local;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::MpesaConfig;
use crate::errors::ServiceError;

pub const TRANSACTION_TYPE_PAYBILL: &str = "CustomerPayBillOnline";
pub const TRANSACTION_TYPE_TILL: &str = "CustomerBuyGoodsOnline";

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Outbound STK push request body, field names as Daraja expects them.
#[derive(Debug, Clone, Serialize)]
pub struct StkPushBody {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Amount")]
    pub amount: u32,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub call_back_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

/// Daraja STK push response. Error responses omit the correlation ids, so
/// every field is optional and the caller decides what is fatal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ResponseCode")]
    pub response_code: Option<String>,
    #[serde(rename = "ResponseDescription")]
    pub response_description: Option<String>,
    #[serde(rename = "CustomerMessage")]
    pub customer_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// The gateway seam the payment service talks through; implemented by
/// [`DarajaClient`] in production and by scripted fakes in tests.
#[async_trait]
pub trait StkGateway: Send + Sync {
    /// Obtains an OAuth access token from the gateway.
    async fn access_token(&self) -> Result<String, ServiceError>;

    /// Submits a push-to-pay prompt to the customer's phone.
    #[allow(clippy::too_many_arguments)]
    async fn stk_push(
        &self,
        access_token: &str,
        phone_254: &str,
        amount: u32,
        business_short_code: &str,
        party_b: &str,
        transaction_type: &str,
        account_reference: &str,
        transaction_desc: &str,
    ) -> Result<StkPushResponse, ServiceError>;

    /// Queries the gateway for the current state of a push attempt.
    async fn stk_query(
        &self,
        access_token: &str,
        checkout_request_id: &str,
    ) -> Result<Value, ServiceError>;
}

/// Production Daraja client.
#[derive(Clone)]
pub struct DarajaClient {
    cfg: MpesaConfig,
    http: Client,
}

impl DarajaClient {
    pub fn new(cfg: MpesaConfig) -> Self {
        Self {
            cfg,
            http: Client::new(),
        }
    }

    fn timestamp() -> String {
        Local::now().format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Daraja STK password: base64(shortcode + passkey + timestamp).
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    BASE64.encode(format!("{}{}{}", shortcode, passkey, timestamp))
}

#[async_trait]
impl StkGateway for DarajaClient {
    #[instrument(skip(self))]
    async fn access_token(&self) -> Result<String, ServiceError> {
        if self.cfg.consumer_key.is_empty() || self.cfg.consumer_secret.is_empty() {
            return Err(ServiceError::AuthError(
                "missing mpesa consumer_key / consumer_secret".to_string(),
            ));
        }

        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.cfg.base_url()
        );

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.cfg.consumer_key, Some(&self.cfg.consumer_secret))
            .send()
            .await
            .map_err(|e| ServiceError::AuthError(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::AuthError(format!(
                "token request rejected with status {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::AuthError(format!("invalid token response: {}", e)))?;

        body.access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServiceError::AuthError("gateway returned no access_token".to_string()))
    }

    #[instrument(skip(self, access_token))]
    async fn stk_push(
        &self,
        access_token: &str,
        phone_254: &str,
        amount: u32,
        business_short_code: &str,
        party_b: &str,
        transaction_type: &str,
        account_reference: &str,
        transaction_desc: &str,
    ) -> Result<StkPushResponse, ServiceError> {
        if self.cfg.passkey.is_empty() {
            return Err(ServiceError::GatewayError(
                "missing mpesa passkey".to_string(),
            ));
        }
        if self.cfg.callback_url.is_empty() {
            return Err(ServiceError::GatewayError(
                "missing mpesa callback_url".to_string(),
            ));
        }

        let shortcode = if business_short_code.is_empty() {
            self.cfg.shortcode.as_str()
        } else {
            business_short_code
        };
        let party_b = if party_b.is_empty() { shortcode } else { party_b };
        let transaction_type = if transaction_type.is_empty() {
            TRANSACTION_TYPE_PAYBILL
        } else {
            transaction_type
        };

        let timestamp = Self::timestamp();
        let body = StkPushBody {
            business_short_code: shortcode.to_string(),
            password: stk_password(shortcode, &self.cfg.passkey, &timestamp),
            timestamp,
            transaction_type: transaction_type.to_string(),
            amount,
            party_a: phone_254.to_string(),
            party_b: party_b.to_string(),
            phone_number: phone_254.to_string(),
            call_back_url: self.cfg.callback_url.clone(),
            account_reference: account_reference.to_string(),
            transaction_desc: transaction_desc.to_string(),
        };

        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.cfg.base_url());
        debug!(url = %url, shortcode = %shortcode, "submitting STK push");

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("stk push request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::GatewayError(format!(
                "stk push rejected with status {}: {}",
                status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("invalid stk push response: {}", e)))
    }

    #[instrument(skip(self, access_token))]
    async fn stk_query(
        &self,
        access_token: &str,
        checkout_request_id: &str,
    ) -> Result<Value, ServiceError> {
        let timestamp = Self::timestamp();
        let payload = serde_json::json!({
            "BusinessShortCode": self.cfg.shortcode,
            "Password": stk_password(&self.cfg.shortcode, &self.cfg.passkey, &timestamp),
            "Timestamp": timestamp,
            "CheckoutRequestID": checkout_request_id,
        });

        let url = format!("{}/mpesa/stkpushquery/v1/query", self.cfg.base_url());

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("stk query request failed: {}", e)))?;

        response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("invalid stk query response: {}", e)))
    }
}
