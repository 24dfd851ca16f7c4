//! Structural decode of the Daraja STK callback payload.
//!
//! Every field is optional: the processor treats a payload missing the nested
//! `Body.stkCallback` structure as malformed and acknowledges it without
//! acting, so the gateway never retries garbage at us.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Daraja reports success with ResultCode 0; every non-zero code covers both
/// explicit failure and user cancellation.
pub const RESULT_CODE_SUCCESS: i64 = 0;

/// Metadata item name carrying the M-Pesa receipt number.
pub const RECEIPT_ITEM_NAME: &str = "MpesaReceiptNumber";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: Option<CallbackBody>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: Option<StkCallback>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ResultCode")]
    pub result_code: Option<i64>,
    #[serde(rename = "ResultDesc")]
    pub result_desc: Option<String>,
    #[serde(rename = "CallbackMetadata")]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item")]
    pub item: Option<Vec<MetadataItem>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: Option<String>,
    #[serde(rename = "Value")]
    pub value: Option<Value>,
}

impl StkCallbackEnvelope {
    /// Decodes an arbitrary JSON payload; anything undecodable collapses to
    /// the empty envelope, which [`Self::stk`] then reports as absent.
    pub fn from_value(payload: &Value) -> Self {
        serde_json::from_value(payload.clone()).unwrap_or_default()
    }

    pub fn stk(&self) -> Option<&StkCallback> {
        self.body.as_ref()?.stk_callback.as_ref()
    }
}

impl StkCallback {
    /// Scans the metadata list for the receipt number.
    ///
    /// A missing receipt is not an error; confirmation proceeds with a null
    /// receipt reference.
    pub fn receipt_number(&self) -> Option<String> {
        let items = self.callback_metadata.as_ref()?.item.as_ref()?;
        for item in items {
            if item.name.as_deref() == Some(RECEIPT_ITEM_NAME) {
                return item.value.as_ref().map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
            }
        }
        None
    }
}
