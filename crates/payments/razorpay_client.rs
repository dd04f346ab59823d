use serde::Deserialize;
use thiserror::Error;

use crate::infra::security::signatures::verify_signature;

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";
const UNKNOWN_EVENT_ID: &str = "unknown";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RazorpayWebhookError {
    #[error("missing or invalid webhook signature")]
    InvalidSignature,
    #[error("webhook body is not valid JSON: {0}")]
    InvalidPayload(String),
}

/// Verifies and decodes Razorpay webhook deliveries.
pub struct RazorpayWebhookVerifier {
    webhook_secret: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RazorpayEvent {
    pub id: Option<String>,
    #[serde(default)]
    pub event: String,
    pub created_at: Option<i64>,
    #[serde(default)]
    pub payload: RazorpayPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RazorpayPayload {
    pub payment: Option<EntityWrapper<RazorpayPayment>>,
    pub subscription: Option<EntityWrapper<RazorpaySubscription>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityWrapper<T> {
    pub entity: T,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RazorpayPayment {
    pub id: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub subscription_id: Option<String>,
    pub invoice_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RazorpaySubscription {
    pub id: Option<String>,
    pub plan_id: Option<String>,
    pub current_start: Option<i64>,
    pub current_end: Option<i64>,
    pub end_at: Option<i64>,
}

impl RazorpayWebhookVerifier {
    pub fn new(webhook_secret: String) -> Self {
        Self { webhook_secret }
    }

    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<RazorpayEvent, RazorpayWebhookError> {
        let signature = signature
            .filter(|value| !value.trim().is_empty())
            .ok_or(RazorpayWebhookError::InvalidSignature)?;

        if !verify_signature(&self.webhook_secret, payload, signature) {
            return Err(RazorpayWebhookError::InvalidSignature);
        }

        serde_json::from_slice(payload)
            .map_err(|err| RazorpayWebhookError::InvalidPayload(err.to_string()))
    }
}

impl RazorpayEvent {
    pub fn payment(&self) -> Option<&RazorpayPayment> {
        self.payload.payment.as_ref().map(|wrapper| &wrapper.entity)
    }

    pub fn subscription(&self) -> Option<&RazorpaySubscription> {
        self.payload.subscription.as_ref().map(|wrapper| &wrapper.entity)
    }

    /// Dedup key: payment id, then subscription id, then the event id.
    pub fn idempotency_key(&self) -> String {
        self.payment()
            .and_then(|payment| payment.id.clone())
            .or_else(|| self.subscription().and_then(|sub| sub.id.clone()))
            .or_else(|| self.id.clone())
            .unwrap_or_else(|| UNKNOWN_EVENT_ID.to_string())
    }

    /// Gateway subscription id the event refers to, if any.
    pub fn subscription_id(&self) -> Option<String> {
        self.subscription()
            .and_then(|sub| sub.id.clone())
            .or_else(|| self.payment().and_then(|payment| payment.subscription_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::security::signatures::sign_payload;
    use serde_json::json;

    fn signed(body: &serde_json::Value) -> (Vec<u8>, String) {
        let bytes = serde_json::to_vec(body).unwrap();
        let signature = sign_payload("rzp_secret", &bytes).unwrap();
        (bytes, signature)
    }

    #[test]
    fn rejects_missing_or_wrong_signature() {
        let verifier = RazorpayWebhookVerifier::new("rzp_secret".to_string());
        let (body, _) = signed(&json!({"event": "invoice.paid"}));

        assert_eq!(
            verifier.verify_and_parse(&body, None).unwrap_err(),
            RazorpayWebhookError::InvalidSignature
        );
        assert_eq!(
            verifier.verify_and_parse(&body, Some("deadbeef")).unwrap_err(),
            RazorpayWebhookError::InvalidSignature
        );
    }

    #[test]
    fn signed_non_json_body_is_invalid_payload() {
        let verifier = RazorpayWebhookVerifier::new("rzp_secret".to_string());
        let body = b"not json";
        let signature = sign_payload("rzp_secret", body).unwrap();

        assert!(matches!(
            verifier.verify_and_parse(body, Some(&signature)),
            Err(RazorpayWebhookError::InvalidPayload(_))
        ));
    }

    #[test]
    fn idempotency_key_prefers_payment_then_subscription_then_event() {
        let verifier = RazorpayWebhookVerifier::new("rzp_secret".to_string());

        let (body, sig) = signed(&json!({
            "id": "evt_1",
            "event": "payment.failed",
            "payload": {
                "payment": {"entity": {"id": "pay_1", "subscription_id": "sub_9"}},
                "subscription": {"entity": {"id": "sub_1"}}
            }
        }));
        let event = verifier.verify_and_parse(&body, Some(&sig)).unwrap();
        assert_eq!(event.idempotency_key(), "pay_1");
        assert_eq!(event.subscription_id().as_deref(), Some("sub_1"));

        let (body, sig) = signed(&json!({
            "id": "evt_2",
            "event": "subscription.halted",
            "payload": {"subscription": {"entity": {"id": "sub_2"}}}
        }));
        let event = verifier.verify_and_parse(&body, Some(&sig)).unwrap();
        assert_eq!(event.idempotency_key(), "sub_2");

        let (body, sig) = signed(&json!({"id": "evt_3", "event": "order.paid"}));
        let event = verifier.verify_and_parse(&body, Some(&sig)).unwrap();
        assert_eq!(event.idempotency_key(), "evt_3");

        let (body, sig) = signed(&json!({"event": "order.paid"}));
        let event = verifier.verify_and_parse(&body, Some(&sig)).unwrap();
        assert_eq!(event.idempotency_key(), "unknown");
    }
}
