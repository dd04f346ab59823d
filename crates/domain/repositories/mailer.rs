use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::billing::EmailMessage;

#[automock]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<()>;
}
