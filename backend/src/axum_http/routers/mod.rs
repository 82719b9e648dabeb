pub mod credits;
pub mod orders;
pub mod payment_callback;
pub mod subscriptions;
pub mod usage_records;
pub mod usage_webhook;

use std::sync::Arc;

use infra::payments::epay_client::EpayClient;

use crate::config::config_model::Epay;

pub(crate) fn epay_gateway(epay: &Epay) -> Arc<EpayClient> {
    Arc::new(EpayClient::new(
        epay.gateway_url.clone(),
        epay.merchant_id.clone(),
        epay.merchant_key.clone(),
        epay.notify_url.clone(),
        epay.return_url.clone(),
        epay.site_name.clone(),
    ))
}
