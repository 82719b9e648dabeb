pub mod entities;
pub mod ledger;
pub mod repositories;
pub mod value_objects;
