use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::error_responses::AppError;

/// Shared secret for the `/internal` routes.
#[derive(Clone)]
pub struct InternalToken(Arc<str>);

impl InternalToken {
    pub fn new(token: &str) -> Self {
        Self(Arc::from(token))
    }
}

pub async fn require_internal_token(
    State(token): State<InternalToken>,
    request: Request,
    next: Next,
) -> Response {
    if authorize_bearer(request.headers(), &token.0).is_err() {
        warn!(path = %request.uri().path(), "internal_auth: rejected request");
        return AppError::Unauthorized.into_response();
    }
    next.run(request).await
}

pub fn authorize_bearer(headers: &HeaderMap, expected_token: &str) -> Result<(), StatusCode> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !expected_token.is_empty() && token == expected_token {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn accepts_matching_bearer_token() {
        assert!(authorize_bearer(&headers("Bearer s3cret"), "s3cret").is_ok());
    }

    #[test]
    fn rejects_missing_wrong_or_malformed_tokens() {
        assert_eq!(
            authorize_bearer(&HeaderMap::new(), "s3cret"),
            Err(StatusCode::UNAUTHORIZED)
        );
        assert!(authorize_bearer(&headers("Bearer nope"), "s3cret").is_err());
        assert!(authorize_bearer(&headers("s3cret"), "s3cret").is_err());
        assert!(authorize_bearer(&headers("Bearer "), "").is_err());
    }
}
