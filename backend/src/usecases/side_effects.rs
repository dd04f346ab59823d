use std::{sync::Arc, time::Duration};

use crates::domain::{
    repositories::mailer::Mailer,
    value_objects::billing::{DunningEmailData, EmailMessage, ReceiptEmailData},
};
use tokio::sync::{Semaphore, mpsc, mpsc::error::TrySendError};
use tracing::{error, info, warn};

use super::webhook_outbox::{ScanWebhookJob, WebhookOutboxUseCase};

const EMAIL_MAX_ATTEMPTS: u32 = 3;
const EMAIL_BASE_DELAY: Duration = Duration::from_millis(500);
const MAX_CONCURRENT_JOBS: usize = 8;

/// Work a request hands off instead of doing inline.
#[derive(Debug, Clone)]
pub enum SideEffect {
    ReceiptEmail(ReceiptEmailData),
    DunningEmail(DunningEmailData),
    DeliverScanWebhook(ScanWebhookJob),
}

impl SideEffect {
    fn kind(&self) -> &'static str {
        match self {
            SideEffect::ReceiptEmail(_) => "receipt_email",
            SideEffect::DunningEmail(_) => "dunning_email",
            SideEffect::DeliverScanWebhook(_) => "scan_webhook",
        }
    }
}

/// Producer side of the bounded side-effect channel.
#[derive(Clone)]
pub struct SideEffectQueue {
    tx: mpsc::Sender<SideEffect>,
}

impl SideEffectQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SideEffect>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Never blocks the caller. A full or closed queue drops the job.
    pub fn submit(&self, job: SideEffect) {
        let kind = job.kind();
        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(kind, "side_effects: queue is full, dropping job");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(kind, "side_effects: queue is closed, dropping job");
            }
        }
    }
}

pub struct SideEffectRunner {
    mailer: Arc<dyn Mailer>,
    webhooks: Arc<WebhookOutboxUseCase>,
    app_name: String,
    app_url: String,
}

impl SideEffectRunner {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        webhooks: Arc<WebhookOutboxUseCase>,
        app_name: String,
        app_url: String,
    ) -> Self {
        Self {
            mailer,
            webhooks,
            app_name,
            app_url,
        }
    }

    /// Consumes jobs until every queue handle is dropped.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<SideEffect>) {
        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_JOBS));
        info!(max_concurrent = MAX_CONCURRENT_JOBS, "side_effects: runner started");

        while let Some(job) = rx.recv().await {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let runner = Arc::clone(&self);
            tokio::spawn(async move {
                let _permit = permit;
                runner.handle(job).await;
            });
        }

        // Wait for in-flight jobs before reporting the runner as stopped.
        let _drained = semaphore.acquire_many(MAX_CONCURRENT_JOBS as u32).await;
        info!("side_effects: queue closed, runner stopped");
    }

    pub async fn handle(&self, job: SideEffect) {
        match job {
            SideEffect::ReceiptEmail(data) => {
                let message = data.render(&self.app_name, &self.app_url);
                self.send_email(message).await;
            }
            SideEffect::DunningEmail(data) => {
                let message = data.render(&self.app_url);
                self.send_email(message).await;
            }
            SideEffect::DeliverScanWebhook(job) => {
                let qr_code_id = job.qr_code_id;
                // Failed deliveries stay in the outbox for the retry sweep.
                if let Err(err) = self.webhooks.deliver_scan(job).await {
                    error!(%qr_code_id, error = ?err, "side_effects: scan webhook not recorded");
                }
            }
        }
    }

    async fn send_email(&self, message: EmailMessage) {
        let mut attempt = 1;
        loop {
            match self.mailer.send(message.clone()).await {
                Ok(()) => {
                    info!(tag = %message.tag, attempt, "side_effects: email sent");
                    return;
                }
                Err(err) if attempt < EMAIL_MAX_ATTEMPTS => {
                    let delay = EMAIL_BASE_DELAY * 2u32.pow(attempt - 1);
                    warn!(tag = %message.tag, attempt, error = ?err, ?delay, "side_effects: email failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(tag = %message.tag, attempt, error = ?err, "side_effects: email dropped");
                    return;
                }
            }
        }
    }
}
