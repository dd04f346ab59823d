use std::{sync::Arc, time::Duration};

use anyhow::Result;
use crates::{
    domain::repositories::{cache::CacheStore, mailer::Mailer},
    infra::{
        cache::memory_cache::MemoryCache,
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{
                api_keys::ApiKeyPostgres, bulk_groups::BulkGroupPostgres, invoices::InvoicePostgres,
                organizations::OrganizationPostgres, qr_code_scans::QrCodeScanPostgres,
                qr_codes::QrCodePostgres, rate_limits::RateLimitPostgres,
                subscriptions::SubscriptionPostgres, users::UserPostgres,
                webhook_events::WebhookEventPostgres, webhook_logs::WebhookLogPostgres,
            },
        },
        mailer::{console::ConsoleMailer, resend::ResendMailer},
        webhooks::http_dispatcher::HttpWebhookDispatcher,
    },
    payments::razorpay_client::RazorpayWebhookVerifier,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{
    auth::SessionVerifier,
    config::config_model::{DotEnvyConfig, EmailProvider},
    usecases::{
        access::AccessPolicy,
        api_keys::ApiKeyUseCase,
        billing_webhook::BillingWebhookUseCase,
        bulk::BulkUseCase,
        credits::CreditsUseCase,
        entitlements::EntitlementsUseCase,
        qr_codes::QrCodesUseCase,
        rate_limiter::RateLimiter,
        scans::ScansUseCase,
        side_effects::{SideEffect, SideEffectQueue, SideEffectRunner},
        webhook_outbox::WebhookOutboxUseCase,
    },
};

/// Every use case the HTTP layer serves, wired against Postgres and the process cache.
pub struct AppServices {
    pub session_verifier: Arc<SessionVerifier>,
    pub rate_limiter: Arc<RateLimiter>,
    pub entitlements: Arc<EntitlementsUseCase>,
    pub credits: Arc<CreditsUseCase>,
    pub qr_codes: Arc<QrCodesUseCase>,
    pub bulk: Arc<BulkUseCase>,
    pub scans: Arc<ScansUseCase>,
    pub api_keys: Arc<ApiKeyUseCase>,
    pub billing_webhook: Arc<BillingWebhookUseCase>,
    pub webhook_outbox: Arc<WebhookOutboxUseCase>,
    pub side_effect_runner: Arc<SideEffectRunner>,
}

impl AppServices {
    pub fn build(
        config: &DotEnvyConfig,
        db_pool: Arc<PgPoolSquad>,
        cache: Arc<MemoryCache>,
    ) -> Result<(Self, mpsc::Receiver<SideEffect>)> {
        let cache: Arc<dyn CacheStore> = cache;

        let users = Arc::new(UserPostgres::new(Arc::clone(&db_pool)));
        let qr_codes = Arc::new(QrCodePostgres::new(Arc::clone(&db_pool)));
        let scans = Arc::new(QrCodeScanPostgres::new(Arc::clone(&db_pool)));
        let organizations = Arc::new(OrganizationPostgres::new(Arc::clone(&db_pool)));
        let webhook_logs = Arc::new(WebhookLogPostgres::new(Arc::clone(&db_pool)));

        let rate_limiter = Arc::new(RateLimiter::new(
            Arc::new(RateLimitPostgres::new(Arc::clone(&db_pool))),
            config.rate_limit.fail_open,
        ));
        let access = Arc::new(AccessPolicy::new(organizations));
        let entitlements = Arc::new(EntitlementsUseCase::new(
            users.clone(),
            qr_codes.clone(),
            scans.clone(),
            Arc::clone(&cache),
        ));

        let dispatcher = Arc::new(HttpWebhookDispatcher::new(Duration::from_secs(
            config.outbound_webhooks.timeout_seconds,
        ))?);
        let webhook_outbox = Arc::new(WebhookOutboxUseCase::new(
            qr_codes.clone(),
            webhook_logs,
            dispatcher,
            Arc::clone(&entitlements),
            Arc::clone(&access),
            config.outbound_webhooks.max_attempts,
        ));

        let (side_effects, side_effect_rx) = SideEffectQueue::new(config.side_effects.queue_capacity);
        let side_effect_runner = Arc::new(SideEffectRunner::new(
            build_mailer(config)?,
            Arc::clone(&webhook_outbox),
            config.mailer.app_name.clone(),
            config.mailer.app_url.clone(),
        ));

        let verifier = config
            .razorpay
            .webhook_secret
            .clone()
            .map(RazorpayWebhookVerifier::new);
        if verifier.is_none() {
            warn!("RAZORPAY_WEBHOOK_SECRET is not set; billing webhooks will be refused");
        }

        let services = Self {
            session_verifier: Arc::new(SessionVerifier::new(config.supabase.jwt_secret.clone())),
            credits: Arc::new(CreditsUseCase::new(users.clone(), Arc::clone(&cache))),
            qr_codes: Arc::new(QrCodesUseCase::new(
                qr_codes.clone(),
                Arc::clone(&entitlements),
                Arc::clone(&access),
                Arc::clone(&rate_limiter),
                Arc::clone(&cache),
            )),
            bulk: Arc::new(BulkUseCase::new(
                qr_codes.clone(),
                Arc::new(BulkGroupPostgres::new(Arc::clone(&db_pool))),
                scans.clone(),
                Arc::clone(&entitlements),
                Arc::clone(&access),
                Arc::clone(&rate_limiter),
                Arc::clone(&cache),
            )),
            scans: Arc::new(ScansUseCase::new(
                qr_codes,
                scans,
                Arc::clone(&entitlements),
                Arc::clone(&access),
                Arc::clone(&rate_limiter),
                side_effects.clone(),
                Arc::clone(&cache),
            )),
            api_keys: Arc::new(ApiKeyUseCase::new(
                Arc::new(ApiKeyPostgres::new(Arc::clone(&db_pool))),
                access,
                Arc::clone(&rate_limiter),
                Arc::clone(&cache),
            )),
            billing_webhook: Arc::new(BillingWebhookUseCase::new(
                verifier,
                Arc::new(WebhookEventPostgres::new(Arc::clone(&db_pool))),
                Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
                Arc::new(InvoicePostgres::new(Arc::clone(&db_pool))),
                users,
                side_effects,
                cache,
            )),
            rate_limiter,
            entitlements,
            webhook_outbox,
            side_effect_runner,
        };

        Ok((services, side_effect_rx))
    }
}

fn build_mailer(config: &DotEnvyConfig) -> Result<Arc<dyn Mailer>> {
    let mailer = &config.mailer;
    match (mailer.provider, mailer.resend_api_key.clone()) {
        (EmailProvider::Resend, Some(api_key)) => {
            info!("mailer: using Resend");
            Ok(Arc::new(ResendMailer::new(
                api_key,
                mailer.from_address.clone(),
                Duration::from_secs(mailer.timeout_seconds),
            )?))
        }
        (EmailProvider::Resend, None) => {
            warn!("EMAIL_PROVIDER=resend without RESEND_API_KEY; emails will only be logged");
            Ok(Arc::new(ConsoleMailer))
        }
        (EmailProvider::Console, _) => Ok(Arc::new(ConsoleMailer)),
    }
}
