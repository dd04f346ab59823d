use super::config::ServiceContext;
use super::notifier::{AlertEvent, Notifier, SpanSummary};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

const REDACTED: &str = "[REDACTED]";
const SENSITIVE_FIELD_MARKERS: [&str; 8] = [
    "secret",
    "token",
    "password",
    "authorization",
    "signature",
    "webhook_url",
    "api_key",
    "key_hash",
];

/// Forwards events at or above `min_level` to the alert notifier.
#[derive(Clone)]
pub(crate) struct AlertLayer {
    notifier: Notifier,
    service_context: ServiceContext,
    min_level: Level,
}

impl AlertLayer {
    pub(crate) fn new(notifier: Notifier, service_context: ServiceContext, min_level: Level) -> Self {
        Self {
            notifier,
            service_context,
            min_level,
        }
    }
}

#[derive(Default)]
struct RedactingVisitor {
    values: BTreeMap<String, String>,
}

impl RedactingVisitor {
    fn insert(&mut self, field: &Field, value: String) {
        self.values
            .insert(field.name().to_string(), redact(field.name(), value));
    }
}

impl Visit for RedactingVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.to_string());
    }
}

struct SpanFields(BTreeMap<String, String>);

impl<S> Layer<S> for AlertLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &tracing::span::Id, ctx: Context<'_, S>) {
        let mut visitor = RedactingVisitor::default();
        attrs.record(&mut visitor);

        if visitor.values.is_empty() {
            return;
        }
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(SpanFields(visitor.values));
        }
    }

    fn on_record(&self, id: &tracing::span::Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut visitor = RedactingVisitor::default();
        values.record(&mut visitor);
        if visitor.values.is_empty() {
            return;
        }

        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(existing) => existing.0.extend(visitor.values),
            None => extensions.insert(SpanFields(visitor.values)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > self.min_level || is_own_event(metadata.target()) {
            return;
        }

        let mut visitor = RedactingVisitor::default();
        event.record(&mut visitor);
        let message = visitor.values.remove("message").map(|raw| unquote(&raw));

        let spans = ctx
            .event_span(event)
            .map(|span| {
                span.scope()
                    .from_root()
                    .map(|s| SpanSummary {
                        name: s.metadata().name().to_string(),
                        fields: s
                            .extensions()
                            .get::<SpanFields>()
                            .map(|fields| fields.0.clone())
                            .unwrap_or_default(),
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        self.notifier.try_notify(AlertEvent {
            level: *metadata.level(),
            timestamp: Utc::now(),
            service_name: self.service_context.service_name.clone(),
            environment: self.service_context.environment.clone(),
            component: self.service_context.component.clone(),
            target: metadata.target().to_string(),
            file: metadata.file().map(str::to_string),
            line: metadata.line(),
            message,
            fields: visitor.values,
            spans,
            suppressed_repeats: 0,
        });
    }
}

/// Events raised by the alert pipeline itself are never re-alerted.
fn is_own_event(target: &str) -> bool {
    target.starts_with(module_path!().trim_end_matches("::layer"))
}

fn unquote(input: &str) -> String {
    let trimmed = input.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed)
        .to_string()
}

fn redact(field_name: &str, value: String) -> String {
    let field = field_name.to_ascii_lowercase();
    if SENSITIVE_FIELD_MARKERS.iter().any(|marker| field.contains(marker)) {
        return REDACTED.to_string();
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensitive_fields_are_redacted() {
        assert_eq!(redact("webhook_secret", "abc".to_string()), REDACTED);
        assert_eq!(redact("Authorization", "Bearer x".to_string()), REDACTED);
        assert_eq!(redact("x_webhook_signature", "ff".to_string()), REDACTED);
        assert_eq!(redact("key_hash", "ff".to_string()), REDACTED);
        assert_eq!(redact("user_id", "42".to_string()), "42");
    }

    #[test]
    fn debug_strings_are_unquoted() {
        assert_eq!(unquote("\"hello\""), "hello");
        assert_eq!(unquote("plain"), "plain");
        assert_eq!(unquote("\""), "\"");
    }

    #[test]
    fn alert_pipeline_events_are_skipped() {
        assert!(is_own_event("crates::observability::notifier"));
        assert!(!is_own_event("backend::usecases::billing_webhook"));
    }
}
