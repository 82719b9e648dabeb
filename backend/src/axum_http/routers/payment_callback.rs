use std::{collections::BTreeMap, sync::Arc, time::Duration};

use application::{errors::BillingError, usercases::payment_callback::PaymentCallbackUseCase};
use axum::{
    Router,
    body::Bytes,
    extract::{Query, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use domain::value_objects::payments::CallbackAck;
use infra::postgres::{
    postgres_connection::PgPoolSquad, repositories::payment_orders::PaymentOrderPostgres,
};
use tracing::{debug, info};
use url::{Url, form_urlencoded};

use super::epay_gateway;
use crate::config::config_model::DotEnvyConfig;

#[derive(Clone)]
pub struct PaymentCallbackState {
    usecase: Arc<PaymentCallbackUseCase>,
    frontend_url: Arc<str>,
}

pub fn routes(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Router {
    let order_repository =
        PaymentOrderPostgres::new(Arc::clone(&db_pool), config.billing.default_timezone);
    let payment_callback_usecase = PaymentCallbackUseCase::new(
        Arc::new(order_repository),
        epay_gateway(&config.epay),
        Duration::from_secs(config.usage_webhook.ingestion_timeout_secs),
    );

    router(
        Arc::new(payment_callback_usecase),
        &config.epay.frontend_url,
    )
}

pub fn router(usecase: Arc<PaymentCallbackUseCase>, frontend_url: &str) -> Router {
    Router::new()
        .route("/epay/callback", get(epay_callback).post(epay_callback))
        .route("/epay/return", get(epay_return))
        .with_state(PaymentCallbackState {
            usecase,
            frontend_url: Arc::from(frontend_url.trim_end_matches('/')),
        })
}

/// Gateways send the notification either as a query string or as a form
/// body. Both are merged; body fields win.
fn collect_params(query: Option<&str>, body: &[u8]) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    if let Some(query) = query {
        params.extend(form_urlencoded::parse(query.as_bytes()).into_owned());
    }
    params.extend(form_urlencoded::parse(body).into_owned());
    params
}

/// Answers the gateway in plain text. Anything but `success` makes it retry.
pub async fn epay_callback(
    State(state): State<PaymentCallbackState>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let params = collect_params(query.as_deref(), &body);

    let ack = match state.usecase.handle(params).await {
        Ok(outcome) => {
            debug!(?outcome, "payment_callback: acknowledged");
            CallbackAck::Success
        }
        Err(BillingError::InvalidSignature) => CallbackAck::Fail,
        Err(err) => {
            info!(error = %err, "payment_callback: asking gateway to retry");
            CallbackAck::Fail
        }
    };

    (StatusCode::OK, ack.as_str()).into_response()
}

/// Browser redirect after checkout. Settlement only happens on the callback.
pub async fn epay_return(
    State(state): State<PaymentCallbackState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Redirect {
    let order_no = params
        .get("out_trade_no")
        .map(String::as_str)
        .unwrap_or_default();
    debug!(%order_no, "payment_callback: buyer returned from gateway");

    let target = format!("{}/orders", state.frontend_url);
    match Url::parse_with_params(&target, &[("orderNo", order_no)]) {
        Ok(url) => Redirect::to(url.as_str()),
        Err(_) => Redirect::to(&target),
    }
}
