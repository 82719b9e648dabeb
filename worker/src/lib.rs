pub mod axum_http;
pub mod billing;
pub mod config;
pub mod credit_scheduler;
