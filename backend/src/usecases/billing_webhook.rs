use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use crates::{
    domain::{
        entities::{
            invoices::InsertInvoiceEntity,
            subscriptions::{SubscriptionEntity, SubscriptionTransitionEntity},
        },
        repositories::{
            cache::CacheStore, invoices::InvoiceRepository, subscriptions::SubscriptionRepository,
            users::UserRepository, webhook_events::WebhookEventRepository,
        },
        value_objects::billing::{
            BillingEvent, DEFAULT_CURRENCY, DunningEmailData, GATEWAY_RAZORPAY,
            INVOICE_STATUS_PAID, ReceiptEmailData, activation_transition, cancellation_transition,
            past_due_transition,
        },
    },
    infra::cache::{keys, typed},
    payments::razorpay_client::{RazorpayEvent, RazorpayWebhookError, RazorpayWebhookVerifier},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::side_effects::{SideEffect, SideEffectQueue};

#[derive(Debug, Error)]
pub enum BillingWebhookError {
    #[error("billing webhook secret is not configured")]
    NotConfigured,
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),
    #[error("billing webhook processing failed")]
    Processing(#[source] anyhow::Error),
}

impl From<RazorpayWebhookError> for BillingWebhookError {
    fn from(err: RazorpayWebhookError) -> Self {
        match err {
            RazorpayWebhookError::InvalidSignature => BillingWebhookError::InvalidSignature,
            RazorpayWebhookError::InvalidPayload(message) => BillingWebhookError::InvalidPayload(message),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, BillingWebhookError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookAckDto {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookAckDto {
    fn processed() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    fn duplicate() -> Self {
        Self {
            ok: true,
            message: Some("Duplicate webhook, ignored".to_string()),
        }
    }
}

pub struct BillingWebhookUseCase {
    verifier: Option<RazorpayWebhookVerifier>,
    webhook_event_repository: Arc<dyn WebhookEventRepository + Send + Sync>,
    subscription_repository: Arc<dyn SubscriptionRepository + Send + Sync>,
    invoice_repository: Arc<dyn InvoiceRepository + Send + Sync>,
    user_repository: Arc<dyn UserRepository + Send + Sync>,
    side_effects: SideEffectQueue,
    cache: Arc<dyn CacheStore>,
}

impl BillingWebhookUseCase {
    pub fn new(
        verifier: Option<RazorpayWebhookVerifier>,
        webhook_event_repository: Arc<dyn WebhookEventRepository + Send + Sync>,
        subscription_repository: Arc<dyn SubscriptionRepository + Send + Sync>,
        invoice_repository: Arc<dyn InvoiceRepository + Send + Sync>,
        user_repository: Arc<dyn UserRepository + Send + Sync>,
        side_effects: SideEffectQueue,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            verifier,
            webhook_event_repository,
            subscription_repository,
            invoice_repository,
            user_repository,
            side_effects,
            cache,
        }
    }

    pub async fn handle(&self, body: &[u8], signature: Option<&str>) -> UseCaseResult<WebhookAckDto> {
        let verifier = self
            .verifier
            .as_ref()
            .ok_or(BillingWebhookError::NotConfigured)?;
        let event = verifier.verify_and_parse(body, signature)?;
        let event_id = event.idempotency_key();

        let first_delivery = self
            .webhook_event_repository
            .record(GATEWAY_RAZORPAY, &event_id)
            .await
            .map_err(BillingWebhookError::Processing)?;
        if !first_delivery {
            info!(%event_id, event = %event.event, "billing_webhook: duplicate delivery ignored");
            return Ok(WebhookAckDto::duplicate());
        }

        if let Err(err) = self.dispatch(&event).await {
            error!(%event_id, event = %event.event, error = ?err, "billing_webhook: processing failed");
            // Let the gateway's retry reprocess the event.
            if let Err(release_err) = self
                .webhook_event_repository
                .release(GATEWAY_RAZORPAY, &event_id)
                .await
            {
                error!(%event_id, error = ?release_err, "billing_webhook: failed to release idempotency record");
            }
            return Err(BillingWebhookError::Processing(err));
        }

        info!(%event_id, event = %event.event, "billing_webhook: processed");
        Ok(WebhookAckDto::processed())
    }

    async fn dispatch(&self, event: &RazorpayEvent) -> Result<()> {
        let now = Utc::now();
        match BillingEvent::from_event_name(&event.event) {
            BillingEvent::SubscriptionActivated => {
                let subscription = event.subscription();
                let transition = activation_transition(
                    subscription.and_then(|s| s.current_start),
                    subscription.and_then(|s| s.current_end),
                    now,
                );
                self.transition(event, transition).await
            }
            BillingEvent::SubscriptionPastDue => {
                let end_at = event.subscription().and_then(|s| s.end_at);
                self.transition(event, past_due_transition(end_at, now)).await
            }
            BillingEvent::SubscriptionCanceled => {
                self.transition(event, cancellation_transition(now)).await
            }
            BillingEvent::InvoicePaid => self.record_invoice(event).await,
            BillingEvent::PaymentFailed => self.notify_payment_failed(event).await,
            BillingEvent::Ignored(name) => {
                debug!(event = %name, "billing_webhook: unhandled event acknowledged");
                Ok(())
            }
        }
    }

    async fn transition(
        &self,
        event: &RazorpayEvent,
        transition: SubscriptionTransitionEntity,
    ) -> Result<()> {
        let Some(gateway_id) = event.subscription_id() else {
            warn!(event = %event.event, "billing_webhook: subscription event without subscription id");
            return Ok(());
        };

        match self
            .subscription_repository
            .apply_transition(&gateway_id, transition)
            .await?
        {
            Some(subscription) => {
                typed::invalidate(self.cache.as_ref(), &[keys::user_plan(subscription.user_id)]).await;
                info!(
                    %gateway_id,
                    user_id = %subscription.user_id,
                    status = %subscription.status,
                    "billing_webhook: subscription transitioned"
                );
            }
            None => {
                warn!(%gateway_id, "billing_webhook: unknown subscription");
            }
        }
        Ok(())
    }

    async fn resolve_subscription(&self, event: &RazorpayEvent) -> Result<Option<SubscriptionEntity>> {
        let Some(gateway_id) = event.subscription_id() else {
            return Ok(None);
        };
        let subscription = self
            .subscription_repository
            .find_by_gateway_id(&gateway_id)
            .await?;
        if subscription.is_none() {
            warn!(%gateway_id, event = %event.event, "billing_webhook: unknown subscription");
        }
        Ok(subscription)
    }

    async fn record_invoice(&self, event: &RazorpayEvent) -> Result<()> {
        let Some(subscription) = self.resolve_subscription(event).await? else {
            return Ok(());
        };
        let payment = event.payment().cloned().unwrap_or_default();
        let now = Utc::now();
        let currency = currency_of(payment.currency.as_deref());
        let amount_minor = payment.amount.unwrap_or(0);
        let gateway_invoice_id = payment.id.clone().unwrap_or_else(|| event.idempotency_key());

        self.invoice_repository
            .create_invoice(InsertInvoiceEntity {
                user_id: subscription.user_id,
                subscription_id: Some(subscription.id),
                gateway: GATEWAY_RAZORPAY.to_string(),
                gateway_invoice_id: gateway_invoice_id.clone(),
                amount_minor,
                currency: currency.clone(),
                status: INVOICE_STATUS_PAID.to_string(),
                pdf_url: payment.invoice_url.clone(),
                paid_at: Some(now),
            })
            .await?;

        match self.user_repository.find_by_id(subscription.user_id).await? {
            Some(user) => self.side_effects.submit(SideEffect::ReceiptEmail(ReceiptEmailData {
                user_id: user.id,
                name: user.name.clone().unwrap_or_else(|| user.email.clone()),
                email: user.email,
                invoice_id: gateway_invoice_id,
                amount_minor,
                currency,
                plan: Some(subscription.plan),
                paid_at: now,
            })),
            None => warn!(user_id = %subscription.user_id, "billing_webhook: invoice owner not found"),
        }
        Ok(())
    }

    async fn notify_payment_failed(&self, event: &RazorpayEvent) -> Result<()> {
        let Some(subscription) = self.resolve_subscription(event).await? else {
            return Ok(());
        };
        let payment = event.payment().cloned().unwrap_or_default();

        match self.user_repository.find_by_id(subscription.user_id).await? {
            Some(user) => self.side_effects.submit(SideEffect::DunningEmail(DunningEmailData {
                user_id: user.id,
                name: user.name.clone().unwrap_or_else(|| user.email.clone()),
                email: user.email,
                payment_id: payment.id.unwrap_or_else(|| event.idempotency_key()),
                amount_minor: payment.amount.unwrap_or(0),
                currency: currency_of(payment.currency.as_deref()),
                due_date: subscription.current_period_end,
            })),
            None => warn!(user_id = %subscription.user_id, "billing_webhook: payment owner not found"),
        }
        Ok(())
    }
}

fn currency_of(currency: Option<&str>) -> String {
    currency
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CURRENCY)
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::entitlements::tests::sample_user;
    use crates::{
        domain::repositories::{
            invoices::MockInvoiceRepository, subscriptions::MockSubscriptionRepository,
            users::MockUserRepository, webhook_events::MockWebhookEventRepository,
        },
        infra::{cache::memory_cache::MemoryCache, security::signatures::sign_payload},
    };
    use serde_json::json;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    const SECRET: &str = "rzp_secret";

    fn signed(body: serde_json::Value) -> (Vec<u8>, String) {
        let bytes = serde_json::to_vec(&body).unwrap();
        let signature = sign_payload(SECRET, &bytes).unwrap();
        (bytes, signature)
    }

    fn subscription(user_id: Uuid, status: &str) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id,
            gateway_subscription_id: "sub_1".to_string(),
            plan: "PRO".to_string(),
            status: status.to_string(),
            current_period_start: Some(now),
            current_period_end: Some(now + chrono::Duration::days(30)),
            grace_until: None,
            canceled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    struct Repos {
        events: MockWebhookEventRepository,
        subscriptions: MockSubscriptionRepository,
        invoices: MockInvoiceRepository,
        users: MockUserRepository,
    }

    impl Repos {
        fn new() -> Self {
            Self {
                events: MockWebhookEventRepository::new(),
                subscriptions: MockSubscriptionRepository::new(),
                invoices: MockInvoiceRepository::new(),
                users: MockUserRepository::new(),
            }
        }

        fn build(self, secret: Option<&str>) -> (BillingWebhookUseCase, mpsc::Receiver<SideEffect>) {
            let (queue, rx) = SideEffectQueue::new(8);
            let usecase = BillingWebhookUseCase::new(
                secret.map(|s| RazorpayWebhookVerifier::new(s.to_string())),
                Arc::new(self.events),
                Arc::new(self.subscriptions),
                Arc::new(self.invoices),
                Arc::new(self.users),
                queue,
                Arc::new(MemoryCache::new()),
            );
            (usecase, rx)
        }
    }

    #[tokio::test]
    async fn missing_secret_and_bad_signature_are_rejected() {
        let (body, signature) = signed(json!({"event": "invoice.paid"}));

        let (usecase, _rx) = Repos::new().build(None);
        assert!(matches!(
            usecase.handle(&body, Some(&signature)).await,
            Err(BillingWebhookError::NotConfigured)
        ));

        let (usecase, _rx) = Repos::new().build(Some(SECRET));
        assert!(matches!(
            usecase.handle(&body, Some("00ff")).await,
            Err(BillingWebhookError::InvalidSignature)
        ));
        assert!(matches!(
            usecase.handle(&body, None).await,
            Err(BillingWebhookError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn duplicate_deliveries_are_acknowledged_without_side_effects() {
        let mut repos = Repos::new();
        repos
            .events
            .expect_record()
            .withf(|gateway, id| gateway == "razorpay" && id == "sub_1")
            .times(1)
            .returning(|_, _| Ok(false));
        repos.subscriptions.expect_apply_transition().never();

        let (usecase, _rx) = repos.build(Some(SECRET));
        let (body, signature) = signed(json!({
            "event": "subscription.cancelled",
            "payload": {"subscription": {"entity": {"id": "sub_1"}}}
        }));
        let ack = usecase.handle(&body, Some(&signature)).await.unwrap();
        assert_eq!(ack, WebhookAckDto::duplicate());
    }

    #[tokio::test]
    async fn cancellation_opens_a_grace_period() {
        let user_id = Uuid::new_v4();
        let mut repos = Repos::new();
        repos.events.expect_record().returning(|_, _| Ok(true));
        repos
            .subscriptions
            .expect_apply_transition()
            .withf(|id, transition| {
                id == "sub_1"
                    && transition.status.as_deref() == Some("canceled")
                    && matches!(transition.grace_until, Some(Some(_)))
            })
            .times(1)
            .returning(move |_, _| Ok(Some(subscription(user_id, "canceled"))));

        let (usecase, _rx) = repos.build(Some(SECRET));
        let (body, signature) = signed(json!({
            "event": "subscription.cancelled",
            "payload": {"subscription": {"entity": {"id": "sub_1"}}}
        }));
        assert_eq!(
            usecase.handle(&body, Some(&signature)).await.unwrap(),
            WebhookAckDto::processed()
        );
    }

    #[tokio::test]
    async fn paid_invoice_is_stored_and_receipt_enqueued() {
        let user_id = Uuid::new_v4();
        let mut repos = Repos::new();
        repos.events.expect_record().returning(|_, _| Ok(true));
        repos
            .subscriptions
            .expect_find_by_gateway_id()
            .returning(move |_| Ok(Some(subscription(user_id, "active"))));
        repos
            .invoices
            .expect_create_invoice()
            .withf(|invoice| {
                invoice.gateway_invoice_id == "pay_1"
                    && invoice.amount_minor == 199_900
                    && invoice.currency == "INR"
                    && invoice.status == "paid"
            })
            .times(1)
            .returning(|_| Ok(Uuid::new_v4()));
        repos
            .users
            .expect_find_by_id()
            .returning(|id| Ok(Some(sample_user(id, "PRO", 0))));

        let (usecase, mut rx) = repos.build(Some(SECRET));
        let (body, signature) = signed(json!({
            "event": "invoice.paid",
            "payload": {"payment": {"entity": {
                "id": "pay_1", "amount": 199_900, "currency": "inr", "subscription_id": "sub_1"
            }}}
        }));
        usecase.handle(&body, Some(&signature)).await.unwrap();

        match rx.try_recv().unwrap() {
            SideEffect::ReceiptEmail(receipt) => {
                assert_eq!(receipt.invoice_id, "pay_1");
                assert_eq!(receipt.plan.as_deref(), Some("PRO"));
            }
            other => panic!("unexpected side effect: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_payment_enqueues_dunning_with_period_end() {
        let user_id = Uuid::new_v4();
        let stored = subscription(user_id, "active");
        let period_end = stored.current_period_end;
        let mut repos = Repos::new();
        repos.events.expect_record().returning(|_, _| Ok(true));
        repos
            .subscriptions
            .expect_find_by_gateway_id()
            .returning(move |_| Ok(Some(stored.clone())));
        repos
            .users
            .expect_find_by_id()
            .returning(|id| Ok(Some(sample_user(id, "PRO", 0))));

        let (usecase, mut rx) = repos.build(Some(SECRET));
        let (body, signature) = signed(json!({
            "event": "payment.failed",
            "payload": {"payment": {"entity": {"id": "pay_2", "amount": 50_000, "subscription_id": "sub_1"}}}
        }));
        usecase.handle(&body, Some(&signature)).await.unwrap();

        match rx.try_recv().unwrap() {
            SideEffect::DunningEmail(dunning) => {
                assert_eq!(dunning.payment_id, "pay_2");
                assert_eq!(dunning.due_date, period_end);
            }
            other => panic!("unexpected side effect: {other:?}"),
        }
    }

    #[tokio::test]
    async fn processing_failure_releases_the_idempotency_record() {
        let mut repos = Repos::new();
        repos.events.expect_record().returning(|_, _| Ok(true));
        repos
            .events
            .expect_release()
            .withf(|gateway, id| gateway == "razorpay" && id == "sub_1")
            .times(1)
            .returning(|_, _| Ok(()));
        repos
            .subscriptions
            .expect_apply_transition()
            .returning(|_, _| Err(anyhow::anyhow!("connection reset")));

        let (usecase, _rx) = repos.build(Some(SECRET));
        let (body, signature) = signed(json!({
            "event": "subscription.activated",
            "payload": {"subscription": {"entity": {"id": "sub_1", "current_start": 1_700_000_000}}}
        }));
        assert!(matches!(
            usecase.handle(&body, Some(&signature)).await,
            Err(BillingWebhookError::Processing(_))
        ));
    }

    #[tokio::test]
    async fn unhandled_events_are_acknowledged() {
        let mut repos = Repos::new();
        repos.events.expect_record().returning(|_, _| Ok(true));
        let (usecase, _rx) = repos.build(Some(SECRET));
        let (body, signature) = signed(json!({"id": "evt_9", "event": "order.paid"}));
        assert_eq!(
            usecase.handle(&body, Some(&signature)).await.unwrap(),
            WebhookAckDto::processed()
        );
    }
}
