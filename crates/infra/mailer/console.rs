use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::domain::{repositories::mailer::Mailer, value_objects::billing::EmailMessage};

/// Logs outgoing mail instead of sending it. Used when no provider is configured.
#[derive(Debug, Default, Clone)]
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            tag = %message.tag,
            body_len = message.html_body.len(),
            "mailer: email not sent, console provider active"
        );
        Ok(())
    }
}
