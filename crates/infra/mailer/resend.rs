use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use tracing::{error, info};

use crate::domain::{repositories::mailer::Mailer, value_objects::billing::EmailMessage};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

pub struct ResendMailer {
    http: reqwest::Client,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: Vec<String>,
    subject: &'a str,
    html: &'a str,
    tags: Vec<ResendTag<'a>>,
}

#[derive(Serialize)]
struct ResendTag<'a> {
    name: &'a str,
    value: &'a str,
}

impl ResendMailer {
    pub fn new(api_key: String, from: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, api_key, from })
    }

    fn recipient(message: &EmailMessage) -> String {
        match &message.to_name {
            Some(name) if !name.trim().is_empty() => format!("{} <{}>", name.trim(), message.to),
            _ => message.to.clone(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        let body = ResendEmail {
            from: &self.from,
            to: vec![Self::recipient(&message)],
            subject: &message.subject,
            html: &message.html_body,
            tags: vec![ResendTag {
                name: "category",
                value: &message.tag,
            }],
        };

        let resp = self
            .http
            .post(RESEND_ENDPOINT)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = match resp.text().await {
                Ok(text) if !text.is_empty() => text,
                Ok(_) => "<empty response body>".to_string(),
                Err(err) => format!("<failed to read response body: {err}>"),
            };
            error!(
                status = %status,
                tag = %message.tag,
                response = %text,
                "mailer: resend rejected email"
            );
            bail!("resend returned {status}");
        }

        info!(tag = %message.tag, "mailer: email sent");
        Ok(())
    }
}
