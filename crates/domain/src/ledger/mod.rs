//! Pure balance math. Stores load the current row under a lock, ask
//! [`planner::plan_operation`] what to write, check the plan with
//! [`planner::verify_plan`], then persist `next` and the optional entry in the
//! same transaction.

pub mod calendar;
pub mod conversion;
pub mod errors;
pub mod planner;

pub use errors::LedgerError;
pub use planner::{
    BalanceOperation, BalanceOutcome, BalancePlan, LedgerContext, PlannedEntry, SkipReason,
    plan_operation, verify_plan,
};
