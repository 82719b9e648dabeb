use anyhow::Result;
use infra::postgres::postgres_connection;
use std::sync::Arc;
use tracing::{error, info};
use worker::{axum_http, billing, config, credit_scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = run().await {
        error!("Worker exited with error: {}", error);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    infra::observability::init_observability("worker")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!(
        scheduler_timezone = %dotenvy_env.scheduler.timezone,
        daily_sweep_hour = dotenvy_env.scheduler.daily_sweep_hour,
        "ENV has been loaded"
    );

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.statement_timeout_ms,
    )?;
    info!("Postgres connection has been established");

    let sweeps = Arc::new(billing::postgres_sweeps(
        &dotenvy_env,
        Arc::new(postgres_pool),
    ));

    let hourly_loop = tokio::spawn(credit_scheduler::worker::run_hourly(Arc::clone(&sweeps)));
    let daily_loop = tokio::spawn(credit_scheduler::worker::run_daily(
        Arc::clone(&sweeps),
        dotenvy_env.scheduler.timezone,
        dotenvy_env.scheduler.daily_sweep_hour,
    ));

    let server_config = Arc::clone(&dotenvy_env);
    let scheduler_server =
        tokio::spawn(async move { axum_http::http_serve::start(server_config, sweeps).await });

    tokio::select! {
        result = hourly_loop => result??,
        result = daily_loop => result??,
        result = scheduler_server => result??,
    };
    Ok(())
}
