pub mod ledger_tx;
pub mod postgres_connection;
pub mod repositories;
pub mod rows;
pub mod schema;
pub mod subscription_tx;
