use std::{sync::Arc, time::Duration};

use application::usercases::usage_webhook::UsageWebhookUseCase;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use domain::value_objects::usage_webhook::UsageWebhookAck;
use infra::{
    postgres::{
        postgres_connection::PgPoolSquad,
        repositories::{
            api_keys::ApiKeyPostgres, credit_config::CreditConfigPostgres,
            usage_events::UsageEventPostgres,
        },
    },
    webhooks::hmac_verifier::HmacWebhookVerifier,
};

use crate::config::config_model::DotEnvyConfig;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

pub fn routes(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Router {
    let default_timezone = config.billing.default_timezone;
    let usage_webhook_usecase = UsageWebhookUseCase::new(
        Arc::new(HmacWebhookVerifier::new(config.usage_webhook.secret.clone())),
        Arc::new(ApiKeyPostgres::new(Arc::clone(&db_pool))),
        Arc::new(UsageEventPostgres::new(Arc::clone(&db_pool), default_timezone)),
        Arc::new(CreditConfigPostgres::new(Arc::clone(&db_pool))),
        Duration::from_secs(config.usage_webhook.ingestion_timeout_secs),
    );

    router(Arc::new(usage_webhook_usecase))
}

pub fn router(usecase: Arc<UsageWebhookUseCase>) -> Router {
    Router::new()
        .route("/usage", post(receive_usage))
        .with_state(usecase)
}

/// The signature covers the exact bytes received, so the body is taken raw.
/// Processing failures still answer 200 with `success = false`; the sender
/// keys its retries off that flag.
pub async fn receive_usage(
    State(usecase): State<Arc<UsageWebhookUseCase>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match usecase.handle(&body, signature).await {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(err) => (
            err.status_code(),
            Json(UsageWebhookAck {
                success: false,
                message: err.to_string(),
                event_id: None,
            }),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use application::usercases::credit_balance::CreditBalanceUseCase;
    use axum::{body::Body, http::Request};
    use chrono_tz::Tz;
    use domain::entities::api_keys::ApiKeyEntity;
    use infra::memory::InMemoryBillingStore;
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "whsec_test";

    async fn app() -> (Router, Arc<InMemoryBillingStore>, Uuid) {
        let store = Arc::new(InMemoryBillingStore::new(Tz::UTC));
        let user_id = Uuid::new_v4();
        store
            .insert_api_key(ApiKeyEntity {
                id: Uuid::new_v4(),
                user_id,
                remote_key_id: "rk_live".to_string(),
                name: None,
            })
            .await;
        CreditBalanceUseCase::new(store.clone(), store.clone(), store.clone(), Tz::UTC)
            .adjust_by_admin(user_id, 1000, "seed")
            .await
            .unwrap();

        let usecase = UsageWebhookUseCase::new(
            Arc::new(HmacWebhookVerifier::new(SECRET.to_string())),
            store.clone(),
            store.clone(),
            store.clone(),
            Duration::from_secs(5),
        );
        (router(Arc::new(usecase)), store, user_id)
    }

    fn usage_body(event_id: &str) -> String {
        format!(
            r#"{{"eventId":"{event_id}","eventType":"usage","timestamp":"2024-05-01T00:00:00Z","data":{{"remoteKeyId":"rk_live","model":"gpt-4o-mini","promptTokens":120,"completionTokens":30,"totalTokens":150,"cost":0.02}}}}"#
        )
    }

    fn request(body: &str, signature: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/usage")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn ack(response: Response) -> UsageWebhookAck {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn signed_event_is_charged_once_across_replays() {
        let (app, store, user_id) = app().await;
        let body = usage_body("evt-42");
        let signature = HmacWebhookVerifier::new(SECRET.to_string())
            .sign(body.as_bytes())
            .unwrap();

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(request(&body, Some(&signature)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let ack = ack(response).await;
            assert!(ack.success);
            assert_eq!(ack.event_id.as_deref(), Some("evt-42"));
        }

        // 0.02 USD at the default rate of 1000 credits per USD.
        let balance = store.balance_of(user_id).await.unwrap();
        assert_eq!(balance.current_credits, 980);
        assert_eq!(store.usage_records_of(user_id).await.len(), 1);
    }

    #[tokio::test]
    async fn missing_signature_is_bad_request() {
        let (app, store, _) = app().await;

        let response = app
            .oneshot(request(&usage_body("evt-1"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn forged_signature_is_forbidden_and_leaves_no_trace() {
        let (app, store, _) = app().await;
        let forged = HmacWebhookVerifier::new("other".to_string())
            .sign(usage_body("evt-1").as_bytes())
            .unwrap();

        let response = app
            .oneshot(request(&usage_body("evt-1"), Some(&forged)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!ack(response).await.success);
        assert_eq!(store.event_count().await, 0);
    }
}
