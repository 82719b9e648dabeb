use domain::ledger::LedgerError;
use http::StatusCode;
use thiserror::Error;
use tracing::error;

pub const INSUFFICIENT_BALANCE_MESSAGE: &str = "apply for API call denied due to balance";

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("apply for API call denied due to balance")]
    InsufficientBalance,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("operation timed out")]
    Timeout,
    #[error("ledger invariant violated: {0}")]
    InvariantViolation(String),
    #[error(transparent)]
    TransientStorage(anyhow::Error),
}

impl BillingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::InsufficientBalance => StatusCode::PAYMENT_REQUIRED,
            BillingError::InvalidSignature => StatusCode::FORBIDDEN,
            BillingError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            BillingError::NotFound(_) => StatusCode::NOT_FOUND,
            BillingError::InvalidState(_) => StatusCode::CONFLICT,
            BillingError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            BillingError::InvariantViolation(_) | BillingError::TransientStorage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the same request may succeed later. Drives `Retry-After` on
    /// HTTP responses and the usage webhook failure log.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BillingError::TransientStorage(_) | BillingError::Timeout
        )
    }
}

impl From<LedgerError> for BillingError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::InvalidAmount(detail) => BillingError::InvalidPayload(detail),
            LedgerError::InvariantViolation(detail) => BillingError::InvariantViolation(detail),
        }
    }
}

impl From<anyhow::Error> for BillingError {
    fn from(value: anyhow::Error) -> Self {
        match value.downcast_ref::<LedgerError>() {
            Some(ledger_error) => ledger_error.clone().into(),
            None => BillingError::TransientStorage(value),
        }
    }
}

/// Converts a repository failure and logs it at the severity its kind calls for.
pub(crate) fn storage_failure(operation: &'static str, err: anyhow::Error) -> BillingError {
    let err = BillingError::from(err);
    match &err {
        BillingError::InvariantViolation(detail) => {
            error!(
                invariant_violation = true,
                operation,
                %detail,
                "ledger: invariant violated, transaction rolled back"
            );
        }
        BillingError::TransientStorage(source) => {
            error!(operation, db_error = ?source, "ledger: storage failure");
        }
        _ => {}
    }
    err
}

pub type BillingResult<T> = std::result::Result<T, BillingError>;
