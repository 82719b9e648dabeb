use std::sync::Arc;

use application::usercases::usage_records::UsageRecordsUseCase;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use chrono::{DateTime, Utc};
use domain::value_objects::usage_records::{UsageRecordFilter, UsageRecordPage};
use infra::postgres::{
    postgres_connection::PgPoolSquad, repositories::usage_events::UsageEventPostgres,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{axum_http::error_responses::AppError, config::config_model::DotEnvyConfig};

pub fn routes(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Router {
    let event_repository = UsageEventPostgres::new(db_pool, config.billing.default_timezone);

    router(Arc::new(UsageRecordsUseCase::new(Arc::new(event_repository))))
}

pub fn router(usecase: Arc<UsageRecordsUseCase>) -> Router {
    Router::new()
        .route("/:user_id", get(list))
        .with_state(usecase)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecordsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub api_key_id: Option<Uuid>,
    pub model: Option<String>,
    /// RFC 3339, inclusive.
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

pub async fn list(
    State(usecase): State<Arc<UsageRecordsUseCase>>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<UsageRecordsQuery>,
) -> Result<Json<UsageRecordPage>, AppError> {
    let mut filter = UsageRecordFilter::new(query.page, query.page_size);
    filter.api_key_id = query.api_key_id;
    filter.model = query.model.filter(|model| !model.is_empty());
    filter.start = query.start;
    filter.end = query.end;

    Ok(Json(usecase.list(user_id, filter).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use chrono_tz::Tz;
    use domain::{
        repositories::usage_events::UsageEventRepository,
        value_objects::usage_webhook::NewUsageEvent,
    };
    use infra::memory::InMemoryBillingStore;
    use serde_json::Value;
    use tower::ServiceExt;

    fn usage(user_id: Uuid, api_key_id: Uuid, n: usize, model: &str) -> NewUsageEvent {
        NewUsageEvent {
            event_id: format!("evt-{n}"),
            event_type: "usage".to_string(),
            payload: serde_json::json!({}),
            user_id,
            api_key_id,
            model: model.to_string(),
            prompt_tokens: 60,
            completion_tokens: 40,
            total_tokens: 100,
            cost_usd: 0.01,
            credits: 10,
        }
    }

    fn get(uri: String) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn lists_a_filtered_page_with_totals() {
        let store = Arc::new(InMemoryBillingStore::new(Tz::UTC));
        let user_id = Uuid::new_v4();
        let api_key_id = Uuid::new_v4();
        for n in 0..3 {
            store
                .ingest_usage(usage(user_id, api_key_id, n, "gpt-4o"), Utc::now())
                .await
                .unwrap();
        }
        store
            .ingest_usage(usage(user_id, api_key_id, 3, "claude"), Utc::now())
            .await
            .unwrap();
        let app = router(Arc::new(UsageRecordsUseCase::new(store)));

        let response = app
            .clone()
            .oneshot(get(format!("/{user_id}?model=gpt-4o&pageSize=2")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = json(response).await;
        assert_eq!(page["total"], 3);
        assert_eq!(page["totalPages"], 2);
        assert_eq!(page["records"].as_array().unwrap().len(), 2);
        assert_eq!(page["summary"]["totalTokens"], 300);
        assert_eq!(page["summary"]["totalCredits"], 30);

        let response = app
            .oneshot(get(format!(
                "/{user_id}?start=2030-01-02T00:00:00Z&end=2030-01-01T00:00:00Z"
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
