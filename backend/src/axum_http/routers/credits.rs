use std::sync::Arc;

use application::{errors::BillingError, usercases::credit_balance::CreditBalanceUseCase};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use domain::value_objects::{
    credits::{BalanceView, DeductResult, TransactionFilter, TransactionPage},
    enums::transaction_types::TransactionType,
};
use infra::postgres::{
    postgres_connection::PgPoolSquad,
    repositories::{
        credit_config::CreditConfigPostgres, credit_ledger::CreditLedgerPostgres,
        subscriptions::SubscriptionPostgres,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{axum_http::error_responses::AppError, config::config_model::DotEnvyConfig};

pub fn routes(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Router {
    let default_timezone = config.billing.default_timezone;
    let credit_balance_usecase = CreditBalanceUseCase::new(
        Arc::new(CreditLedgerPostgres::new(Arc::clone(&db_pool), default_timezone)),
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool), default_timezone)),
        Arc::new(CreditConfigPostgres::new(Arc::clone(&db_pool))),
        default_timezone,
    );

    router(Arc::new(credit_balance_usecase))
}

pub fn router(usecase: Arc<CreditBalanceUseCase>) -> Router {
    Router::new()
        .route("/:user_id/balance", get(balance))
        .route("/:user_id/transactions", get(transactions))
        .route("/:user_id/adjust", post(adjust))
        .route("/:user_id/signup-bonus", post(signup_bonus))
        .route("/:user_id/deduct", post(deduct))
        .with_state(usecase)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub amount: i64,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct AdjustResponse {
    pub balance: i64,
}

#[derive(Debug, Serialize)]
pub struct SignupBonusResponse {
    pub granted: bool,
}

/// Either an exact credit amount or an upstream USD cost to convert.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductRequest {
    pub amount: Option<i64>,
    pub cost_usd: Option<f64>,
    pub reason: String,
    pub reference: Option<String>,
}

pub async fn balance(
    State(usecase): State<Arc<CreditBalanceUseCase>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<BalanceView>, AppError> {
    Ok(Json(usecase.get_balance(user_id).await?))
}

pub async fn transactions(
    State(usecase): State<Arc<CreditBalanceUseCase>>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<TransactionPage>, AppError> {
    let kind = match query.kind.as_deref().filter(|kind| !kind.is_empty()) {
        Some(kind) => Some(
            TransactionType::from_str(kind)
                .ok_or_else(|| AppError::BadRequest(format!("unknown transaction type: {kind}")))?,
        ),
        None => None,
    };
    let filter = TransactionFilter::new(query.page, query.page_size, kind);

    Ok(Json(usecase.list_transactions(user_id, filter).await?))
}

pub async fn adjust(
    State(usecase): State<Arc<CreditBalanceUseCase>>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<AdjustRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.reason.trim().is_empty() {
        return Err(AppError::BadRequest("reason is required".to_string()));
    }
    let balance = usecase
        .adjust_by_admin(user_id, request.amount, &request.reason)
        .await?;

    Ok(Json(AdjustResponse { balance }))
}

pub async fn signup_bonus(
    State(usecase): State<Arc<CreditBalanceUseCase>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let granted = usecase.grant_signup_bonus(user_id).await?;
    Ok(Json(SignupBonusResponse { granted }))
}

/// Synchronous charge. A declined charge is answered with 402.
pub async fn deduct(
    State(usecase): State<Arc<CreditBalanceUseCase>>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<DeductRequest>,
) -> Result<Json<DeductResult>, AppError> {
    let result = match (request.amount, request.cost_usd) {
        (Some(amount), None) => {
            usecase
                .require_deduct(user_id, amount, &request.reason, request.reference)
                .await?
        }
        (None, Some(cost_usd)) => {
            let result = usecase
                .deduct_from_external_cost(user_id, cost_usd, &request.reason, request.reference)
                .await?;
            if !result.ok {
                return Err(BillingError::InsufficientBalance.into());
            }
            result
        }
        _ => {
            return Err(AppError::BadRequest(
                "exactly one of amount or costUsd is required".to_string(),
            ));
        }
    };

    Ok(Json(result))
}
