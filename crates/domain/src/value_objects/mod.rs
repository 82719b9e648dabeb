pub mod credits;
pub mod enums;
pub mod pagination;
pub mod payments;
pub mod subscriptions;
pub mod usage_records;
pub mod usage_webhook;
