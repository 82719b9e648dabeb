use anyhow::{Context, Result, bail};
use domain::ledger::calendar::{FALLBACK_DEFAULT_TIMEZONE, parse_default_timezone};

use super::config_model::{Database, DotEnvyConfig, Epay, Internal, Scheduler, WorkerServer};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let worker_server = WorkerServer {
        port: std::env::var("SERVER_PORT_WORKER")
            .expect("SERVER_PORT_WORKER is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
        statement_timeout_ms: std::env::var("DATABASE_STATEMENT_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .context("DATABASE_STATEMENT_TIMEOUT_MS is invalid")?,
    };

    let default_timezone = parse_default_timezone(
        &std::env::var("DEFAULT_TIMEZONE").unwrap_or_else(|_| FALLBACK_DEFAULT_TIMEZONE.to_string()),
    );
    let scheduler = Scheduler {
        default_timezone,
        timezone: std::env::var("SCHEDULER_TIMEZONE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| parse_default_timezone(&v))
            .unwrap_or(default_timezone),
        daily_sweep_hour: parse_sweep_hour(
            &std::env::var("DAILY_SWEEP_HOUR").unwrap_or_else(|_| "0".to_string()),
        )?,
        webhook_log_retention_days: std::env::var("WEBHOOK_LOG_RETENTION_DAYS")
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v >= 0)
            .unwrap_or(7),
    };

    let epay = Epay {
        gateway_url: std::env::var("EPAY_GATEWAY_URL").unwrap_or_default(),
        merchant_id: std::env::var("EPAY_MERCHANT_ID").unwrap_or_default(),
        merchant_key: std::env::var("EPAY_MERCHANT_KEY").unwrap_or_default(),
        notify_url: std::env::var("EPAY_NOTIFY_URL").unwrap_or_default(),
        return_url: std::env::var("EPAY_RETURN_URL").unwrap_or_default(),
        site_name: std::env::var("EPAY_SITE_NAME").unwrap_or_else(|_| "billing".to_string()),
    };

    let internal = Internal {
        admin_token: std::env::var("INTERNAL_ADMIN_TOKEN").ok().and_then(|v| {
            let trimmed = v.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        }),
    };

    Ok(DotEnvyConfig {
        worker_server,
        database,
        scheduler,
        epay,
        internal,
    })
}

fn parse_sweep_hour(value: &str) -> Result<u32> {
    let hour: u32 = value.trim().parse().context("DAILY_SWEEP_HOUR is invalid")?;
    if hour > 23 {
        bail!("DAILY_SWEEP_HOUR must be between 0 and 23, got {hour}");
    }
    Ok(hour)
}
