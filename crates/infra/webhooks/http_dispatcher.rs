use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use tracing::warn;

use crate::domain::{
    repositories::webhook_dispatcher::WebhookDispatcher,
    value_objects::webhooks::{
        DeliveryOutcome, EVENT_HEADER, SCAN_EVENT, SIGNATURE_HEADER, WEBHOOK_USER_AGENT,
    },
};

/// Delivers signed scan events to customer endpoints.
pub struct HttpWebhookDispatcher {
    http: reqwest::Client,
}

impl HttpWebhookDispatcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl WebhookDispatcher for HttpWebhookDispatcher {
    async fn deliver(&self, url: &str, body: &str, signature: Option<String>) -> DeliveryOutcome {
        let mut request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, WEBHOOK_USER_AGENT)
            .header(EVENT_HEADER, SCAN_EVENT);
        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let result = request.body(body.to_string()).send().await;

        match result {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let text = resp.text().await.unwrap_or_default();
                DeliveryOutcome::from_response(status, &text)
            }
            Err(err) => {
                warn!(error = %err, timeout = err.is_timeout(), "webhooks: delivery transport error");
                DeliveryOutcome::from_transport_error(&err.to_string())
            }
        }
    }
}
