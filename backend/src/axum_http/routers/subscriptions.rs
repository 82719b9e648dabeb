use std::sync::Arc;

use application::usercases::subscriptions::SubscriptionUseCase;
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use domain::{
    entities::subscriptions::SubscriptionEntity,
    value_objects::subscriptions::{SubscriptionChange, SubscriptionView},
};
use infra::postgres::{
    postgres_connection::PgPoolSquad,
    repositories::{
        subscription_packages::SubscriptionPackagePostgres, subscriptions::SubscriptionPostgres,
    },
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{axum_http::error_responses::AppError, config::config_model::DotEnvyConfig};

pub fn routes(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Router {
    let subscription_repository =
        SubscriptionPostgres::new(Arc::clone(&db_pool), config.billing.default_timezone);
    let package_repository = SubscriptionPackagePostgres::new(Arc::clone(&db_pool));
    let subscription_usecase =
        SubscriptionUseCase::new(Arc::new(subscription_repository), Arc::new(package_repository));

    router(Arc::new(subscription_usecase))
}

pub fn router(usecase: Arc<SubscriptionUseCase>) -> Router {
    Router::new()
        .route("/:user_id", get(current))
        .route("/:user_id/history", get(history))
        .route("/:user_id/grant", post(grant))
        .route("/:user_id/cancel", post(cancel))
        .route("/:user_id/auto-renew", post(auto_renew))
        .with_state(usecase)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRequest {
    pub package_id: Uuid,
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoRenewRequest {
    pub auto_renew: bool,
}

/// `null` when the user has nothing in force.
pub async fn current(
    State(usecase): State<Arc<SubscriptionUseCase>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Option<SubscriptionView>>, AppError> {
    Ok(Json(usecase.get_active_subscription(user_id).await?))
}

/// Every subscription the user has held, newest first.
pub async fn history(
    State(usecase): State<Arc<SubscriptionUseCase>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<SubscriptionEntity>>, AppError> {
    Ok(Json(usecase.history(user_id).await?))
}

pub async fn grant(
    State(usecase): State<Arc<SubscriptionUseCase>>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<GrantRequest>,
) -> Result<Json<SubscriptionChange>, AppError> {
    let change = usecase
        .create_or_renew(user_id, request.package_id, request.reference)
        .await?;
    Ok(Json(change))
}

pub async fn cancel(
    State(usecase): State<Arc<SubscriptionUseCase>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<SubscriptionEntity>, AppError> {
    Ok(Json(usecase.cancel(user_id).await?))
}

pub async fn auto_renew(
    State(usecase): State<Arc<SubscriptionUseCase>>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<AutoRenewRequest>,
) -> Result<Json<SubscriptionEntity>, AppError> {
    Ok(Json(
        usecase.set_auto_renew(user_id, request.auto_renew).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use chrono_tz::Tz;
    use domain::{
        entities::subscription_packages::SubscriptionPackageEntity,
        value_objects::enums::subscription_statuses::SubscriptionStatus,
    };
    use infra::memory::InMemoryBillingStore;
    use tower::ServiceExt;

    async fn app() -> (Router, Arc<InMemoryBillingStore>, Uuid) {
        let store = Arc::new(InMemoryBillingStore::new(Tz::UTC));
        let package_id = Uuid::new_v4();
        store
            .insert_package(SubscriptionPackageEntity {
                id: package_id,
                name: "Team".to_string(),
                cycle_days: 30,
                price_minor: 4900,
                base_credits: 20_000,
                replenish_credits: 500,
                is_active: true,
            })
            .await;
        let usecase = SubscriptionUseCase::new(store.clone(), store.clone());
        (router(Arc::new(usecase)), store, package_id)
    }

    fn post(uri: String, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn grant_then_cancel_twice() {
        let (app, store, package_id) = app().await;
        let user_id = Uuid::new_v4();

        let response = app
            .clone()
            .oneshot(post(
                format!("/{user_id}/grant"),
                serde_json::json!({ "packageId": package_id }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.balance_of(user_id).await.unwrap().current_credits, 20_000);

        let response = app
            .clone()
            .oneshot(post(format!("/{user_id}/cancel"), serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            store.subscriptions_of(user_id).await[0].status,
            SubscriptionStatus::Cancelled
        );

        let response = app
            .oneshot(post(format!("/{user_id}/cancel"), serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn auto_renew_without_subscription_is_not_found() {
        let (app, _, _) = app().await;

        let response = app
            .oneshot(post(
                format!("/{}/auto-renew", Uuid::new_v4()),
                serde_json::json!({ "autoRenew": true }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn history_lists_cancelled_and_current_rows() {
        let (app, _, package_id) = app().await;
        let user_id = Uuid::new_v4();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/{user_id}/history"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let rows: Vec<SubscriptionEntity> = serde_json::from_slice(&bytes).unwrap();
        assert!(rows.is_empty());

        app.clone()
            .oneshot(post(
                format!("/{user_id}/grant"),
                serde_json::json!({ "packageId": package_id }),
            ))
            .await
            .unwrap();
        app.clone()
            .oneshot(post(format!("/{user_id}/cancel"), serde_json::json!({})))
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/{user_id}/history"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let rows: Vec<SubscriptionEntity> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, SubscriptionStatus::Cancelled);
        assert_eq!(rows[0].package_id, package_id);
    }
}
