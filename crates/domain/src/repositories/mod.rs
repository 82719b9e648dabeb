pub mod api_keys;
pub mod credit_config;
pub mod credit_ledger;
pub mod payment_orders;
pub mod subscription_packages;
pub mod subscriptions;
pub mod usage_events;
