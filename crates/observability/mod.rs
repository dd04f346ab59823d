mod alert_webhook;
mod config;
mod layer;
mod notifier;

use anyhow::Result;
use alert_webhook::AlertWebhookProvider;
use config::ObservabilityConfig;
use layer::AlertLayer;
use notifier::Notifier;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber for one process (`backend`, `worker`).
///
/// Must run inside a tokio runtime when an alert webhook is configured.
pub fn init_observability(component: &str) -> Result<()> {
    let mut config = ObservabilityConfig::from_env(component);

    let alert_layer = match config.alerts.as_ref() {
        Some(alerts) => match AlertWebhookProvider::new(alerts.webhook_url.clone()) {
            Ok(provider) => {
                let notifier = Notifier::new(vec![Arc::new(provider)], alerts.dedup_window);
                Some(
                    AlertLayer::new(notifier, config.service_context.clone(), alerts.min_level)
                        .with_filter(tracing_subscriber::filter::LevelFilter::from_level(
                            alerts.min_level,
                        )),
                )
            }
            Err(err) => {
                config
                    .warnings
                    .push(format!("alert webhook client failed to build; alerts disabled ({err})"));
                None
            }
        },
        None => None,
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    let alerts_enabled = alert_layer.is_some();

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
        alerts_enabled,
        "observability: initialized"
    );

    Ok(())
}
