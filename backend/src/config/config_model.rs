use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub usage_webhook: UsageWebhook,
    pub epay: Epay,
    pub internal: Internal,
    pub billing: Billing,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub statement_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct UsageWebhook {
    pub secret: String,
    pub ingestion_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Epay {
    pub gateway_url: String,
    pub merchant_id: String,
    pub merchant_key: String,
    pub notify_url: String,
    pub return_url: String,
    pub site_name: String,
    pub pay_methods: Vec<String>,
    pub frontend_url: String,
}

#[derive(Debug, Clone)]
pub struct Internal {
    /// Internal API is not mounted when unset.
    pub admin_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Billing {
    pub default_timezone: Tz,
    pub order_ttl_minutes: i64,
}
