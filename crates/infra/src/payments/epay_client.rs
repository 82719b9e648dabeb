use std::collections::BTreeMap;

use anyhow::{Result, bail};
use hmac::digest::{CtOutput, Output};
use md5::{Digest, Md5};
use url::Url;

use application::gateways::{PaymentGateway, PaymentRequest};
use domain::value_objects::payments::PaymentForm;

pub const SIGN_TYPE: &str = "MD5";
pub const TRADE_SUCCESS: &str = "TRADE_SUCCESS";

/// Merchant settings for an epay-compatible aggregator.
#[derive(Debug, Clone)]
pub struct EpayClient {
    gateway_url: String,
    merchant_id: String,
    merchant_key: String,
    notify_url: String,
    return_url: String,
    site_name: String,
}

impl EpayClient {
    pub fn new(
        gateway_url: String,
        merchant_id: String,
        merchant_key: String,
        notify_url: String,
        return_url: String,
        site_name: String,
    ) -> Self {
        Self {
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            merchant_id,
            merchant_key,
            notify_url,
            return_url,
            site_name,
        }
    }

    pub fn sign(&self, params: &BTreeMap<String, String>) -> String {
        sign_params(params, &self.merchant_key)
    }
}

/// Sorted `k=v` pairs joined by `&`, skipping empty values and the signature
/// fields, with the key appended, then lowercase hex MD5.
pub fn sign_params(params: &BTreeMap<String, String>, merchant_key: &str) -> String {
    hex::encode(params_digest(params, merchant_key))
}

fn params_digest(params: &BTreeMap<String, String>, merchant_key: &str) -> Output<Md5> {
    let canonical = params
        .iter()
        .filter(|(k, v)| !v.is_empty() && k.as_str() != "sign" && k.as_str() != "sign_type")
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Md5::new();
    hasher.update(canonical.as_bytes());
    hasher.update(merchant_key.as_bytes());
    hasher.finalize()
}

/// Compares raw digest bytes in constant time. Hex case is irrelevant.
fn signature_matches(expected: Output<Md5>, provided: &str) -> bool {
    let Ok(provided) = hex::decode(provided.trim()) else {
        return false;
    };
    if provided.len() != expected.len() {
        return false;
    }
    CtOutput::<Md5>::new(expected) == CtOutput::new(Output::<Md5>::clone_from_slice(&provided))
}

impl PaymentGateway for EpayClient {
    fn verify_callback(&self, params: &BTreeMap<String, String>) -> bool {
        let Some(provided) = params.get("sign").filter(|s| !s.is_empty()) else {
            return false;
        };
        signature_matches(params_digest(params, &self.merchant_key), provided)
    }

    fn build_payment_form(&self, request: &PaymentRequest) -> Result<PaymentForm> {
        if self.merchant_id.is_empty() || self.merchant_key.is_empty() {
            bail!("epay merchant credentials are not configured");
        }
        let url = Url::parse(&format!("{}/submit.php", self.gateway_url))?;

        let mut params = BTreeMap::new();
        params.insert("pid".to_string(), self.merchant_id.clone());
        params.insert("type".to_string(), request.method.clone());
        params.insert("out_trade_no".to_string(), request.order_no.clone());
        params.insert("notify_url".to_string(), self.notify_url.clone());
        params.insert("return_url".to_string(), self.return_url.clone());
        params.insert("name".to_string(), request.name.clone());
        params.insert("money".to_string(), request.money.clone());
        params.insert("sitename".to_string(), self.site_name.clone());
        params.insert("device".to_string(), request.device.clone());

        let sign = self.sign(&params);
        params.insert("sign".to_string(), sign);
        params.insert("sign_type".to_string(), SIGN_TYPE.to_string());

        Ok(PaymentForm {
            url: url.to_string(),
            params,
        })
    }

    fn is_success_status(&self, trade_status: &str) -> bool {
        trade_status == TRADE_SUCCESS
    }
}
