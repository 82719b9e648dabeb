use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub scheduler: Scheduler,
    pub epay: Epay,
    pub internal: Internal,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub statement_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    /// Fallback for users without a stored timezone.
    pub default_timezone: Tz,
    /// Wall clock the daily sweep is scheduled against.
    pub timezone: Tz,
    pub daily_sweep_hour: u32,
    pub webhook_log_retention_days: i64,
}

/// The worker only expires orders; the gateway is never asked for a form here.
#[derive(Debug, Clone, Default)]
pub struct Epay {
    pub gateway_url: String,
    pub merchant_id: String,
    pub merchant_key: String,
    pub notify_url: String,
    pub return_url: String,
    pub site_name: String,
}

#[derive(Debug, Clone)]
pub struct Internal {
    pub admin_token: Option<String>,
}
