use std::sync::Arc;

use application::usercases::orders::{OrderSettings, OrderUseCase};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::Duration;
use domain::{
    entities::payment_orders::PaymentOrderEntity,
    value_objects::{
        enums::payment_statuses::PaymentStatus,
        payments::{OrderFilter, OrderPage, PaymentForm},
    },
};
use infra::postgres::{
    postgres_connection::PgPoolSquad,
    repositories::{
        payment_orders::PaymentOrderPostgres, subscription_packages::SubscriptionPackagePostgres,
    },
};
use serde::Deserialize;
use uuid::Uuid;

use super::epay_gateway;
use crate::{axum_http::error_responses::AppError, config::config_model::DotEnvyConfig};

pub fn routes(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Router {
    let order_repository =
        PaymentOrderPostgres::new(Arc::clone(&db_pool), config.billing.default_timezone);
    let package_repository = SubscriptionPackagePostgres::new(Arc::clone(&db_pool));
    let order_usecase = OrderUseCase::new(
        Arc::new(order_repository),
        Arc::new(package_repository),
        epay_gateway(&config.epay),
        OrderSettings {
            order_ttl: Duration::minutes(config.billing.order_ttl_minutes),
            pay_methods: config.epay.pay_methods.clone(),
        },
    );

    router(Arc::new(order_usecase))
}

pub fn router(usecase: Arc<OrderUseCase>) -> Router {
    Router::new()
        .route("/", post(create).get(list))
        .route("/by-id/:order_id", get(by_id))
        .route("/:order_no", get(by_order_no))
        .route("/:order_no/pay", post(pay))
        .route("/:order_no/cancel", post(cancel))
        .with_state(usecase)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: Uuid,
    pub package_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayOrderRequest {
    pub user_id: Uuid,
    pub method: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    pub user_id: Uuid,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub status: Option<String>,
}

pub async fn create(
    State(usecase): State<Arc<OrderUseCase>>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<PaymentOrderEntity>, AppError> {
    let order = usecase
        .create_order(request.user_id, request.package_id)
        .await?;
    Ok(Json(order))
}

pub async fn pay(
    State(usecase): State<Arc<OrderUseCase>>,
    Path(order_no): Path<String>,
    Json(request): Json<PayOrderRequest>,
) -> Result<Json<PaymentForm>, AppError> {
    let form = usecase
        .request_payment(&order_no, request.user_id, &request.method)
        .await?;
    Ok(Json(form))
}

pub async fn cancel(
    State(usecase): State<Arc<OrderUseCase>>,
    Path(order_no): Path<String>,
    Json(request): Json<CancelOrderRequest>,
) -> Result<Json<PaymentOrderEntity>, AppError> {
    Ok(Json(usecase.cancel_order(&order_no, request.user_id).await?))
}

pub async fn by_order_no(
    State(usecase): State<Arc<OrderUseCase>>,
    Path(order_no): Path<String>,
) -> Result<Json<PaymentOrderEntity>, AppError> {
    Ok(Json(usecase.get_order(&order_no).await?))
}

pub async fn by_id(
    State(usecase): State<Arc<OrderUseCase>>,
    Path(order_id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<PaymentOrderEntity>, AppError> {
    Ok(Json(usecase.get_order_by_id(order_id, query.user_id).await?))
}

pub async fn list(
    State(usecase): State<Arc<OrderUseCase>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<OrderPage>, AppError> {
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            PaymentStatus::from_str(raw)
                .ok_or_else(|| AppError::BadRequest(format!("unknown order status: {raw}")))?,
        ),
    };
    let filter = OrderFilter::new(query.page, query.page_size, status);
    Ok(Json(usecase.list_orders(query.user_id, filter).await?))
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
    use domain::entities::subscription_packages::SubscriptionPackageEntity;
    use infra::{memory::InMemoryBillingStore, payments::epay_client::EpayClient};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn app() -> (Router, Uuid) {
        let store = Arc::new(InMemoryBillingStore::new(Tz::UTC));
        let package_id = Uuid::new_v4();
        store
            .insert_package(SubscriptionPackageEntity {
                id: package_id,
                name: "Pro".to_string(),
                cycle_days: 30,
                price_minor: 2990,
                base_credits: 10_000,
                replenish_credits: 200,
                is_active: true,
            })
            .await;
        let usecase = OrderUseCase::new(
            store.clone(),
            store.clone(),
            Arc::new(EpayClient::new(
                "https://pay.example.com/".to_string(),
                "1001".to_string(),
                "merchant-secret".to_string(),
                "https://billing.example.com/api/v1/payment/epay/callback".to_string(),
                "https://billing.example.com/api/v1/payment/epay/return".to_string(),
                "billing".to_string(),
            )),
            OrderSettings {
                order_ttl: Duration::minutes(30),
                pay_methods: vec!["alipay".to_string(), "wxpay".to_string()],
            },
        );
        (router(Arc::new(usecase)), package_id)
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn order_lifecycle_over_http() {
        let (app, package_id) = app().await;
        let user_id = Uuid::new_v4();

        let response = app
            .clone()
            .oneshot(post("/", json!({ "userId": user_id, "packageId": package_id })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let order_no = json(response).await["order_no"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .clone()
            .oneshot(post(
                &format!("/{order_no}/pay"),
                json!({ "userId": user_id, "method": "alipay" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let form = json(response).await;
        assert_eq!(form["url"], "https://pay.example.com/submit.php");
        assert_eq!(form["params"]["money"], "29.90");
        assert_eq!(form["params"]["sign_type"], "MD5");

        let response = app
            .clone()
            .oneshot(post(
                &format!("/{order_no}/cancel"),
                json!({ "userId": user_id }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(post(
                &format!("/{order_no}/pay"),
                json!({ "userId": user_id, "method": "alipay" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unsupported_method_is_bad_request() {
        let (app, package_id) = app().await;
        let user_id = Uuid::new_v4();
        let response = app
            .clone()
            .oneshot(post("/", json!({ "userId": user_id, "packageId": package_id })))
            .await
            .unwrap();
        let order_no = json(response).await["order_no"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .oneshot(post(
                &format!("/{order_no}/pay"),
                json!({ "userId": user_id, "method": "paypal" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn orders_are_readable_by_number_id_and_owner() {
        let (app, package_id) = app().await;
        let user_id = Uuid::new_v4();

        let mut orders = Vec::new();
        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(post("/", json!({ "userId": user_id, "packageId": package_id })))
                .await
                .unwrap();
            orders.push(json(response).await);
        }
        let first = &orders[0];
        let order_no = first["order_no"].as_str().unwrap();
        let order_id = first["id"].as_str().unwrap();

        let response = app.clone().oneshot(get(&format!("/{order_no}"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["id"], first["id"]);

        let response = app
            .clone()
            .oneshot(get(&format!("/by-id/{order_id}?userId={user_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(get(&format!("/by-id/{order_id}?userId={}", Uuid::new_v4())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(get(&format!("/?userId={user_id}&pageSize=2&status=pending")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = json(response).await;
        assert_eq!(page["total"], 3);
        assert_eq!(page["totalPages"], 2);
        assert_eq!(page["records"].as_array().unwrap().len(), 2);

        let response = app
            .clone()
            .oneshot(get(&format!("/?userId={user_id}&status=paid")))
            .await
            .unwrap();
        assert_eq!(json(response).await["total"], 0);

        let response = app
            .oneshot(get(&format!("/?userId={user_id}&status=refunded")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_order_no_is_not_found() {
        let (app, _) = app().await;
        let response = app.oneshot(get("/ORD-missing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
