use std::env;
use tracing::Level;
use url::Url;

#[derive(Clone)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Clone)]
pub(crate) struct AlertConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) alert: Option<AlertConfig>,
    /// Logged once tracing is up.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        let component = component.trim().to_string();

        let service_name = env_string("SERVICE_NAME")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| component.clone());

        let environment = env_string("STAGE")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let (alert, warnings) = alert_from_values(
            env_string("ALERT_WEBHOOK_URL").as_deref(),
            env_string("ALERT_NOTIFY_LEVEL").as_deref(),
        );

        Self {
            service_context: ServiceContext {
                service_name,
                environment,
                component,
            },
            alert,
            warnings,
        }
    }
}

pub(crate) fn alert_from_values(
    webhook_url: Option<&str>,
    level: Option<&str>,
) -> (Option<AlertConfig>, Vec<String>) {
    let mut warnings = Vec::new();

    let Some(raw) = webhook_url.map(str::trim).filter(|v| !v.is_empty()) else {
        return (None, warnings);
    };
    let webhook_url = match Url::parse(raw) {
        Ok(url) => url,
        Err(err) => {
            // The URL itself may embed a token, keep it out of the logs.
            warnings.push(format!(
                "ALERT_WEBHOOK_URL is set but invalid; alerts disabled (parse error: {err})"
            ));
            return (None, warnings);
        }
    };

    let min_level = match level.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => parse_level(raw).unwrap_or_else(|| {
            warnings.push(format!(
                "ALERT_NOTIFY_LEVEL is invalid (value: {raw}); defaulting to ERROR"
            ));
            Level::ERROR
        }),
        None => Level::ERROR,
    };

    (
        Some(AlertConfig {
            webhook_url,
            min_level,
        }),
        warnings,
    )
}

fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_url_means_no_alerts() {
        let (alert, warnings) = alert_from_values(None, Some("warn"));
        assert!(alert.is_none());
        assert!(warnings.is_empty());
    }

    #[test]
    fn bad_url_disables_with_warning() {
        let (alert, warnings) = alert_from_values(Some("not a url"), None);
        assert!(alert.is_none());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn level_defaults_to_error() {
        let (alert, warnings) = alert_from_values(Some("https://alerts.example.com/hook"), Some("loud"));
        assert_eq!(alert.unwrap().min_level, Level::ERROR);
        assert_eq!(warnings.len(), 1);

        let (alert, _) = alert_from_values(Some("https://alerts.example.com/hook"), Some("WARN"));
        assert_eq!(alert.unwrap().min_level, Level::WARN);
    }
}
