mod alert_webhook;
mod config;
mod layer;
mod notifier;

use alert_webhook::AlertWebhookProvider;
use anyhow::Result;
use config::ObservabilityConfig;
use layer::AlertNotifyLayer;
use notifier::AlertQueue;
use std::sync::Arc;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the global subscriber. Must be called from inside a tokio runtime
/// when the alert sink is configured.
pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);

    let alert_layer = config.alert.as_ref().map(|alert| {
        let queue = AlertQueue::new(vec![Arc::new(AlertWebhookProvider::new(
            alert.webhook_url.clone(),
        ))]);

        AlertNotifyLayer::new(queue, config.service_context.clone(), alert.min_level).with_filter(
            tracing_subscriber::filter::LevelFilter::from_level(alert.min_level),
        )
    });

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Local time so `TZ=Asia/Shanghai` shows `+08:00` in logs.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    for warning in &config.warnings {
        warn!(
            service = %config.service_context.service_name,
            environment = %config.service_context.environment,
            component = %config.service_context.component,
            warning = %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %config.service_context.service_name,
        environment = %config.service_context.environment,
        component = %config.service_context.component,
        alerts_enabled = config.alert.is_some(),
        "observability: initialized"
    );

    Ok(())
}
