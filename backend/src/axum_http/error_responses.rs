use application::errors::BillingError;
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Billing(#[from] BillingError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Billing(err) => err.status_code(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retryable = matches!(&self, AppError::Billing(err) if err.is_retryable());
        let message = match self {
            AppError::Unauthorized => self.to_string(),
            AppError::BadRequest(msg) => msg,
            // Storage and invariant details stay in the logs.
            AppError::Billing(BillingError::TransientStorage(_))
            | AppError::Billing(BillingError::InvariantViolation(_)) => {
                "Internal server error".to_string()
            }
            AppError::Billing(err) => err.to_string(),
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message,
        });

        let mut response = (status, body).into_response();
        if retryable {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_errors_keep_their_status() {
        let err = AppError::from(BillingError::InsufficientBalance);
        assert_eq!(err.status_code(), StatusCode::PAYMENT_REQUIRED);

        let err = AppError::from(BillingError::NotFound("order"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn storage_failures_are_not_leaked() {
        let response =
            AppError::from(BillingError::TransientStorage(anyhow::anyhow!("pool timed out")))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[RETRY_AFTER], "1");
    }

    #[test]
    fn only_retryable_failures_carry_retry_after() {
        let response = AppError::from(BillingError::Timeout).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(response.headers()[RETRY_AFTER], "1");

        let response = AppError::from(BillingError::NotFound("order")).into_response();
        assert!(response.headers().get(RETRY_AFTER).is_none());

        let response = AppError::BadRequest("bad".to_string()).into_response();
        assert!(response.headers().get(RETRY_AFTER).is_none());
    }
}
