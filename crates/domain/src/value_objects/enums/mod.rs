pub mod payment_statuses;
pub mod subscription_statuses;
pub mod transaction_types;
pub mod webhook_event_statuses;
