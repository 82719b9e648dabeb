pub mod errors;
pub mod gateways;
pub mod usercases;
