use thiserror::Error;

/// Failures the planner and stores raise inside a transaction. Declined
/// deductions are an outcome, not an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("ledger invariant violated: {0}")]
    InvariantViolation(String),
}
