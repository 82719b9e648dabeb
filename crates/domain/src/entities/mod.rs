pub mod api_keys;
pub mod credit_balances;
pub mod credit_transactions;
pub mod payment_orders;
pub mod subscription_packages;
pub mod subscriptions;
pub mod usage_records;
pub mod webhook_events;
