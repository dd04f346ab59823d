use super::notifier::{AlertEvent, AlertSink};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use url::Url;

const CONTENT_LIMIT: usize = 2000;

/// Posts `{"content": ...}` to a chat webhook (Discord and Slack-compatible relays).
pub(crate) struct AlertWebhookProvider {
    webhook_url: Url,
    client: Client,
}

impl AlertWebhookProvider {
    pub(crate) fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(3)).build()?;
        Ok(Self {
            webhook_url,
            client,
        })
    }
}

pub(crate) fn format_content(event: &AlertEvent) -> String {
    let mut lines = vec![
        format!(
            "**{}** `{}` `{}` `{}`",
            event.service_name,
            event.environment,
            event.component,
            event.level.as_str()
        ),
        format!(
            "`{}` `{}`{}",
            event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            event.target,
            match (&event.file, event.line) {
                (Some(file), Some(line)) => format!(" `{file}:{line}`"),
                _ => String::new(),
            }
        ),
    ];

    if let Some(message) = event.message.as_ref().filter(|m| !m.trim().is_empty()) {
        lines.push(format!("> {}", message.trim()));
    }

    if event.suppressed_repeats > 0 {
        lines.push(format!(
            "repeated {} more time(s) since the last alert",
            event.suppressed_repeats
        ));
    }

    let correlation = event.correlation();
    if !correlation.is_empty() {
        let refs = correlation
            .iter()
            .map(|(name, value)| format!("{name}=`{value}`"))
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(format!("refs: {refs}"));
    }

    if !event.spans.is_empty() {
        let chain = event
            .spans
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(" > ");
        lines.push(format!("spans: `{chain}`"));
    }

    for (key, value) in &event.fields {
        lines.push(format!("- `{key}` = `{value}`"));
    }

    for span in event.spans.iter().filter(|s| !s.fields.is_empty()) {
        lines.push(format!("span `{}`:", span.name));
        for (key, value) in &span.fields {
            lines.push(format!("- `{key}` = `{value}`"));
        }
    }

    truncate_content(lines.join("\n"))
}

fn truncate_content(content: String) -> String {
    const SUFFIX: &str = "\n… (truncated)";

    if content.chars().count() <= CONTENT_LIMIT {
        return content;
    }

    let allowed = CONTENT_LIMIT.saturating_sub(SUFFIX.chars().count());
    let mut truncated: String = content.chars().take(allowed).collect();
    truncated.push_str(SUFFIX);
    truncated
}

#[async_trait]
impl AlertSink for AlertWebhookProvider {
    async fn send(&self, event: &AlertEvent) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "content": format_content(event) }))
            .send()
            .await
            // reqwest errors embed the URL, which carries the webhook token.
            .map_err(|err| {
                if err.is_timeout() {
                    anyhow!("alert webhook request timed out")
                } else if err.is_connect() {
                    anyhow!("alert webhook connection failed")
                } else {
                    anyhow!("alert webhook request failed")
                }
            })?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(anyhow!(
            "alert webhook returned non-success status: {}",
            response.status()
        ))
    }

    fn sink_name(&self) -> &'static str {
        "alert_webhook"
    }
}
