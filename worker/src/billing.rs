use std::sync::Arc;

use application::{
    gateways::PaymentGateway,
    usercases::{
        credit_balance::CreditBalanceUseCase,
        credit_sweeps::CreditSweepUseCase,
        orders::{OrderSettings, OrderUseCase},
        subscriptions::SubscriptionUseCase,
    },
};
use chrono::Duration;
use chrono_tz::Tz;
use domain::repositories::{
    credit_config::CreditConfigRepository, credit_ledger::CreditLedgerRepository,
    payment_orders::PaymentOrderRepository, subscription_packages::SubscriptionPackageRepository,
    subscriptions::SubscriptionRepository, usage_events::UsageEventRepository,
};
use infra::{
    payments::epay_client::EpayClient,
    postgres::{
        postgres_connection::PgPoolSquad,
        repositories::{
            credit_config::CreditConfigPostgres, credit_ledger::CreditLedgerPostgres,
            payment_orders::PaymentOrderPostgres,
            subscription_packages::SubscriptionPackagePostgres,
            subscriptions::SubscriptionPostgres, usage_events::UsageEventPostgres,
        },
    },
};

use crate::config::config_model::DotEnvyConfig;

pub fn postgres_sweeps(config: &DotEnvyConfig, db_pool: Arc<PgPoolSquad>) -> CreditSweepUseCase {
    let tz = config.scheduler.default_timezone;
    let epay = &config.epay;

    build_sweeps(
        Arc::new(CreditLedgerPostgres::new(Arc::clone(&db_pool), tz)),
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool), tz)),
        Arc::new(SubscriptionPackagePostgres::new(Arc::clone(&db_pool))),
        Arc::new(PaymentOrderPostgres::new(Arc::clone(&db_pool), tz)),
        Arc::new(UsageEventPostgres::new(Arc::clone(&db_pool), tz)),
        Arc::new(CreditConfigPostgres::new(Arc::clone(&db_pool))),
        Arc::new(EpayClient::new(
            epay.gateway_url.clone(),
            epay.merchant_id.clone(),
            epay.merchant_key.clone(),
            epay.notify_url.clone(),
            epay.return_url.clone(),
            epay.site_name.clone(),
        )),
        tz,
        Duration::days(config.scheduler.webhook_log_retention_days),
    )
}

#[allow(clippy::too_many_arguments)]
pub fn build_sweeps(
    ledger_repo: Arc<dyn CreditLedgerRepository + Send + Sync>,
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    package_repo: Arc<dyn SubscriptionPackageRepository + Send + Sync>,
    order_repo: Arc<dyn PaymentOrderRepository + Send + Sync>,
    event_repo: Arc<dyn UsageEventRepository + Send + Sync>,
    config_repo: Arc<dyn CreditConfigRepository + Send + Sync>,
    gateway: Arc<dyn PaymentGateway>,
    default_timezone: Tz,
    webhook_retention: Duration,
) -> CreditSweepUseCase {
    let credit_balance = Arc::new(CreditBalanceUseCase::new(
        Arc::clone(&ledger_repo),
        Arc::clone(&subscription_repo),
        config_repo,
        default_timezone,
    ));
    let subscriptions = Arc::new(SubscriptionUseCase::new(
        Arc::clone(&subscription_repo),
        Arc::clone(&package_repo),
    ));
    let orders = Arc::new(OrderUseCase::new(
        order_repo,
        package_repo,
        gateway,
        OrderSettings {
            order_ttl: Duration::zero(),
            pay_methods: Vec::new(),
        },
    ));

    CreditSweepUseCase::new(
        credit_balance,
        subscriptions,
        orders,
        ledger_repo,
        subscription_repo,
        event_repo,
        webhook_retention,
    )
}
