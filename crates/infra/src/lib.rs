pub mod memory;
pub mod observability;
pub mod payments;
pub mod postgres;
pub mod webhooks;
