pub mod credit_balance;
pub mod credit_sweeps;
pub mod orders;
pub mod payment_callback;
pub mod subscriptions;
pub mod usage_records;
pub mod usage_webhook;
