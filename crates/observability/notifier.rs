use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};
use tracing::{Level, warn};

const QUEUE_CAPACITY: usize = 256;
const SINK_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_TRACKED_FINGERPRINTS: usize = 1024;

/// Fields that tie an alert to a tenant resource, in display order.
pub(crate) const CORRELATION_FIELDS: [&str; 6] = [
    "user_id",
    "organization_id",
    "qr_code_id",
    "subscription_id",
    "log_id",
    "event_id",
];

#[derive(Clone, Debug)]
pub(crate) struct SpanSummary {
    pub(crate) name: String,
    pub(crate) fields: BTreeMap<String, String>,
}

#[derive(Clone, Debug)]
pub(crate) struct AlertEvent {
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
    pub(crate) target: String,
    pub(crate) file: Option<String>,
    pub(crate) line: Option<u32>,
    pub(crate) message: Option<String>,
    pub(crate) fields: BTreeMap<String, String>,
    pub(crate) spans: Vec<SpanSummary>,
    /// Identical alerts dropped since the previous one was sent.
    pub(crate) suppressed_repeats: u64,
}

impl AlertEvent {
    fn fingerprint(&self) -> String {
        format!(
            "{}|{}|{}",
            self.level,
            self.target,
            self.message.as_deref().unwrap_or_default()
        )
    }

    /// Tenant identifiers from the event, falling back to the innermost span that has them.
    pub(crate) fn correlation(&self) -> Vec<(&'static str, &str)> {
        CORRELATION_FIELDS
            .iter()
            .filter_map(|name| {
                self.fields
                    .get(*name)
                    .or_else(|| self.spans.iter().rev().find_map(|span| span.fields.get(*name)))
                    .map(|value| (*name, value.as_str()))
            })
            .collect()
    }
}

#[async_trait]
pub(crate) trait AlertSink: Send + Sync {
    async fn send(&self, event: &AlertEvent) -> Result<()>;
    fn sink_name(&self) -> &'static str;
}

/// Lets one alert per level/target/message through per `window`. The next alert admitted
/// for a fingerprint carries the number of repeats dropped in between.
pub(crate) struct AlertThrottle {
    window: Duration,
    seen: HashMap<String, (Instant, u64)>,
}

impl AlertThrottle {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
        }
    }

    pub(crate) fn admit(&mut self, event: &mut AlertEvent, now: Instant) -> bool {
        if self.seen.len() >= MAX_TRACKED_FINGERPRINTS {
            let window = self.window;
            self.seen
                .retain(|_, (sent_at, _)| now.duration_since(*sent_at) < window);
        }

        match self.seen.get_mut(&event.fingerprint()) {
            Some((sent_at, suppressed)) if now.duration_since(*sent_at) < self.window => {
                *suppressed += 1;
                false
            }
            Some((sent_at, suppressed)) => {
                event.suppressed_repeats = std::mem::take(suppressed);
                *sent_at = now;
                true
            }
            None => {
                self.seen.insert(event.fingerprint(), (now, 0));
                true
            }
        }
    }
}

/// Queues alerts for a background task so logging never blocks on a sink.
#[derive(Clone)]
pub(crate) struct Notifier {
    tx: mpsc::Sender<AlertEvent>,
}

impl Notifier {
    pub(crate) fn new(sinks: Vec<Arc<dyn AlertSink>>, dedup_window: Duration) -> Self {
        let (tx, mut rx) = mpsc::channel::<AlertEvent>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            let mut throttle = AlertThrottle::new(dedup_window);
            while let Some(mut event) = rx.recv().await {
                if !throttle.admit(&mut event, Instant::now()) {
                    continue;
                }
                for sink in &sinks {
                    match timeout(SINK_TIMEOUT, sink.send(&event)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(error)) => {
                            warn!(sink = sink.sink_name(), error = %error, "observability: alert sink failed");
                        }
                        Err(_) => {
                            warn!(sink = sink.sink_name(), "observability: alert sink timed out");
                        }
                    }
                }
            }
        });

        Self { tx }
    }

    pub(crate) fn try_notify(&self, event: AlertEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("observability: alert queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("observability: alert queue closed, dropping event");
            }
        }
    }
}
