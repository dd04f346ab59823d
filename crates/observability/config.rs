use std::env;
use std::time::Duration;
use tracing::Level;
use url::Url;

#[derive(Debug, Clone)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Debug, Clone)]
pub(crate) struct AlertConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
    /// Identical alerts inside this window are collapsed into one.
    pub(crate) dedup_window: Duration,
}

const DEFAULT_DEDUP_WINDOW_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) alerts: Option<AlertConfig>,
    /// Logged once tracing is up.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(component: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let component = component.trim().to_string();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let service_context = ServiceContext {
            service_name: non_empty("SERVICE_NAME").unwrap_or_else(|| format!("qr-core-{component}")),
            environment: non_empty("STAGE").unwrap_or_else(|| "unknown".to_string()),
            component,
        };

        let (alerts, warnings) = alerts_from(&non_empty);

        Self {
            service_context,
            alerts,
            warnings,
        }
    }
}

fn alerts_from(lookup: &impl Fn(&str) -> Option<String>) -> (Option<AlertConfig>, Vec<String>) {
    let mut warnings = Vec::new();

    let enabled = lookup("ALERT_NOTIFY_ENABLED")
        .and_then(|raw| parse_bool(&raw))
        .unwrap_or(true);
    if !enabled {
        return (None, warnings);
    }

    let Some(raw_url) = lookup("ALERT_WEBHOOK_URL") else {
        return (None, warnings);
    };

    let webhook_url = match Url::parse(&raw_url) {
        Ok(url) => url,
        Err(err) => {
            // The raw URL embeds a token, so only the parse error is reported.
            warnings.push(format!(
                "ALERT_WEBHOOK_URL is set but invalid; alerts disabled (parse error: {err})"
            ));
            return (None, warnings);
        }
    };

    let min_level = match lookup("ALERT_NOTIFY_LEVEL") {
        Some(raw) => parse_level(&raw).unwrap_or_else(|| {
            warnings.push(format!(
                "ALERT_NOTIFY_LEVEL is invalid (value: {raw}); defaulting to ERROR"
            ));
            Level::ERROR
        }),
        None => Level::ERROR,
    };

    let dedup_seconds = match lookup("ALERT_DEDUP_WINDOW_SECONDS") {
        Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
            warnings.push(format!(
                "ALERT_DEDUP_WINDOW_SECONDS is invalid (value: {raw}); defaulting to {DEFAULT_DEDUP_WINDOW_SECONDS}"
            ));
            DEFAULT_DEDUP_WINDOW_SECONDS
        }),
        None => DEFAULT_DEDUP_WINDOW_SECONDS,
    };

    (
        Some(AlertConfig {
            webhook_url,
            min_level,
            dedup_window: Duration::from_secs(dedup_seconds),
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

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
