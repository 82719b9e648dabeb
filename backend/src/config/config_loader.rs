use anyhow::{Context, Result};
use domain::ledger::calendar::{FALLBACK_DEFAULT_TIMEZONE, parse_default_timezone};

use super::config_model::{
    BackendServer, Billing, Database, DotEnvyConfig, Epay, Internal, UsageWebhook,
};

const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 5000;
const DEFAULT_INGESTION_TIMEOUT_SECS: u64 = 10;
const DEFAULT_ORDER_TTL_MINUTES: i64 = 30;
const DEFAULT_PAY_METHODS: &str = "alipay,wxpay";

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: std::env::var("SERVER_PORT_BACKEND")
            .expect("SERVER_PORT_BACKEND is invalid")
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
        statement_timeout_ms: env_or("DATABASE_STATEMENT_TIMEOUT_MS", DEFAULT_STATEMENT_TIMEOUT_MS)?,
    };

    let usage_webhook = UsageWebhook {
        secret: std::env::var("USAGE_WEBHOOK_SECRET").expect("USAGE_WEBHOOK_SECRET is invalid"),
        ingestion_timeout_secs: env_or("INGESTION_TIMEOUT_SECS", DEFAULT_INGESTION_TIMEOUT_SECS)?,
    };

    let epay = Epay {
        gateway_url: std::env::var("EPAY_GATEWAY_URL").expect("EPAY_GATEWAY_URL is invalid"),
        merchant_id: std::env::var("EPAY_MERCHANT_ID").expect("EPAY_MERCHANT_ID is invalid"),
        merchant_key: std::env::var("EPAY_MERCHANT_KEY").expect("EPAY_MERCHANT_KEY is invalid"),
        notify_url: std::env::var("EPAY_NOTIFY_URL").expect("EPAY_NOTIFY_URL is invalid"),
        return_url: std::env::var("EPAY_RETURN_URL").expect("EPAY_RETURN_URL is invalid"),
        site_name: std::env::var("EPAY_SITE_NAME").unwrap_or_else(|_| "billing".to_string()),
        pay_methods: parse_pay_methods(
            &std::env::var("EPAY_PAY_METHODS").unwrap_or_else(|_| DEFAULT_PAY_METHODS.to_string()),
        ),
        frontend_url: std::env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string()),
    };

    let internal = Internal {
        admin_token: optional_secret(std::env::var("INTERNAL_ADMIN_TOKEN").ok()),
    };

    let billing = Billing {
        default_timezone: parse_default_timezone(
            &std::env::var("DEFAULT_TIMEZONE")
                .unwrap_or_else(|_| FALLBACK_DEFAULT_TIMEZONE.to_string()),
        ),
        order_ttl_minutes: env_or("ORDER_TTL_MINUTES", DEFAULT_ORDER_TTL_MINUTES)?,
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        usage_webhook,
        epay,
        internal,
        billing,
    })
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .with_context(|| format!("{name} is invalid")),
        _ => Ok(default),
    }
}

pub fn optional_secret(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}

pub fn parse_pay_methods(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|method| method.trim().to_ascii_lowercase())
        .filter(|method| !method.is_empty())
        .collect()
}
