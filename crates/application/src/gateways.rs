use std::collections::BTreeMap;

use anyhow::Result;
use domain::value_objects::payments::PaymentForm;

/// What the gateway needs to render a purchase form for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub order_no: String,
    pub method: String,
    pub name: String,
    pub money: String,
    pub device: String,
}

/// Fields the callback handler reads from a gateway notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    pub order_no: String,
    pub trade_no: String,
    pub trade_status: String,
    pub money: String,
    pub method: String,
}

impl PaymentNotification {
    pub fn from_params(params: &BTreeMap<String, String>) -> Self {
        let get = |key: &str| params.get(key).cloned().unwrap_or_default();
        Self {
            order_no: get("out_trade_no"),
            trade_no: get("trade_no"),
            trade_status: get("trade_status"),
            money: get("money"),
            method: get("type"),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait PaymentGateway: Send + Sync {
    /// Checks the `sign` parameter against the merchant key.
    fn verify_callback(&self, params: &BTreeMap<String, String>) -> bool;

    fn build_payment_form(&self, request: &PaymentRequest) -> Result<PaymentForm>;

    fn is_success_status(&self, trade_status: &str) -> bool;
}

#[cfg_attr(test, mockall::automock)]
pub trait WebhookSignatureVerifier: Send + Sync {
    fn verify(&self, payload: &[u8], signature: &str) -> bool;
}
