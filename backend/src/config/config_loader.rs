use anyhow::{Context, Result};

use super::{
    config_model::{
        BackendServer, Cache, Database, DotEnvyConfig, EmailProvider, Mailer, OutboundWebhooks,
        RateLimit, Razorpay, SideEffects, Supabase,
    },
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: optional("SERVER_BODY_LIMIT", "10")
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: optional("SERVER_TIMEOUT", "30")
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
        allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| parse_list(&v))
            .unwrap_or_default(),
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: optional("DATABASE_MAX_CONNECTIONS", "10")
            .parse()
            .context("DATABASE_MAX_CONNECTIONS is invalid")?,
    };

    let supabase = Supabase {
        jwt_secret: required("SUPABASE_JWT_SECRET")?,
    };

    let razorpay = Razorpay {
        webhook_secret: non_empty("RAZORPAY_WEBHOOK_SECRET"),
    };

    let outbound_webhooks = OutboundWebhooks {
        timeout_seconds: optional("OUTBOUND_WEBHOOK_TIMEOUT_SECONDS", "30")
            .parse()
            .context("OUTBOUND_WEBHOOK_TIMEOUT_SECONDS is invalid")?,
        max_attempts: optional("OUTBOUND_WEBHOOK_MAX_ATTEMPTS", "5")
            .parse()
            .context("OUTBOUND_WEBHOOK_MAX_ATTEMPTS is invalid")?,
    };

    let rate_limit = RateLimit {
        fail_open: optional("RATE_LIMIT_FAIL_OPEN", "false")
            .parse()
            .context("RATE_LIMIT_FAIL_OPEN is invalid")?,
    };

    let mailer = Mailer {
        provider: parse_email_provider(&optional("EMAIL_PROVIDER", "console"))?,
        resend_api_key: non_empty("RESEND_API_KEY"),
        from_address: optional("EMAIL_FROM", "QR Generator <noreply@example.com>"),
        app_name: optional("APP_NAME", "QR Generator"),
        app_url: optional("APP_URL", "http://localhost:3000")
            .trim_end_matches('/')
            .to_string(),
        timeout_seconds: optional("EMAIL_TIMEOUT_SECONDS", "10")
            .parse()
            .context("EMAIL_TIMEOUT_SECONDS is invalid")?,
    };

    let cache = Cache {
        sweep_interval_seconds: optional("CACHE_SWEEP_INTERVAL_SECONDS", "60")
            .parse()
            .context("CACHE_SWEEP_INTERVAL_SECONDS is invalid")?,
    };

    let side_effects = SideEffects {
        queue_capacity: optional("SIDE_EFFECT_QUEUE_CAPACITY", "1024")
            .parse()
            .context("SIDE_EFFECT_QUEUE_CAPACITY is invalid")?,
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        supabase,
        razorpay,
        outbound_webhooks,
        rate_limit,
        mailer,
        cache,
        side_effects,
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or("".to_string());
    Stage::try_from(&stage_str).unwrap_or_default()
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is invalid"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| {
        let trimmed = v.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_email_provider(value: &str) -> Result<EmailProvider> {
    match value.trim().to_ascii_lowercase().as_str() {
        "resend" => Ok(EmailProvider::Resend),
        "console" | "" => Ok(EmailProvider::Console),
        other => anyhow::bail!("EMAIL_PROVIDER '{other}' is not supported"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_lists_skip_blank_entries() {
        assert_eq!(
            parse_list("https://a.com, ,https://b.com"),
            vec!["https://a.com".to_string(), "https://b.com".to_string()]
        );
    }

    #[test]
    fn email_provider_defaults_to_console() {
        assert_eq!(parse_email_provider("").unwrap(), EmailProvider::Console);
        assert_eq!(parse_email_provider("Resend").unwrap(), EmailProvider::Resend);
        assert!(parse_email_provider("sendgrid").is_err());
    }
}
