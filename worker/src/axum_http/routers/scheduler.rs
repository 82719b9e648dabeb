use std::sync::Arc;

use application::usercases::credit_sweeps::{CreditSweepUseCase, SchedulerStatus};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::{error, info};

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_WORKER/internal/v1/scheduler/daily" \
//     -H "Authorization: Bearer $INTERNAL_ADMIN_TOKEN"

pub fn routes(usecase: Arc<CreditSweepUseCase>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/hourly", post(trigger_hourly))
        .route("/daily", post(trigger_daily))
        .with_state(usecase)
}

pub async fn status(State(usecase): State<Arc<CreditSweepUseCase>>) -> Json<SchedulerStatus> {
    Json(usecase.status())
}

/// Sweeps run on their own task: a request timeout drops the response, not
/// the sweep.
pub async fn trigger_hourly(State(usecase): State<Arc<CreditSweepUseCase>>) -> Response {
    info!("scheduler router: manual hourly replenish requested");
    match tokio::spawn(async move { usecase.run_hourly_replenish().await }).await {
        Ok(run) => Json(run).into_response(),
        Err(err) => {
            error!(error = %err, "scheduler router: hourly replenish task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "sweep failed").into_response()
        }
    }
}

pub async fn trigger_daily(State(usecase): State<Arc<CreditSweepUseCase>>) -> Response {
    info!("scheduler router: manual daily sweep requested");
    match tokio::spawn(async move { usecase.run_daily_sweep().await }).await {
        Ok(run) => Json(run).into_response(),
        Err(err) => {
            error!(error = %err, "scheduler router: daily sweep task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "sweep failed").into_response()
        }
    }
}
