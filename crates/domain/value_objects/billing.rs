use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::domain::{
    entities::subscriptions::{SubscriptionEntity, SubscriptionTransitionEntity},
    value_objects::enums::subscription_statuses::SubscriptionStatus,
};

pub const GATEWAY_RAZORPAY: &str = "razorpay";
pub const GRACE_PERIOD_DAYS: i64 = 7;
pub const DEFAULT_CURRENCY: &str = "INR";
pub const INVOICE_STATUS_PAID: &str = "paid";

/// Gateway events the billing webhook reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    SubscriptionActivated,
    SubscriptionPastDue,
    SubscriptionCanceled,
    InvoicePaid,
    PaymentFailed,
    Ignored(String),
}

impl BillingEvent {
    pub fn from_event_name(name: &str) -> Self {
        match name {
            "subscription.activated" | "subscription.renewed" => BillingEvent::SubscriptionActivated,
            "subscription.halted" | "subscription.paused" => BillingEvent::SubscriptionPastDue,
            "subscription.completed" | "subscription.cancelled" => BillingEvent::SubscriptionCanceled,
            "invoice.paid" => BillingEvent::InvoicePaid,
            "payment.failed" => BillingEvent::PaymentFailed,
            other => BillingEvent::Ignored(other.to_string()),
        }
    }
}

pub fn grace_period() -> Duration {
    Duration::days(GRACE_PERIOD_DAYS)
}

pub fn from_unix_seconds(seconds: Option<i64>) -> Option<DateTime<Utc>> {
    seconds.and_then(|s| Utc.timestamp_opt(s, 0).single())
}

pub fn activation_transition(
    current_start: Option<i64>,
    current_end: Option<i64>,
    now: DateTime<Utc>,
) -> SubscriptionTransitionEntity {
    SubscriptionTransitionEntity {
        status: Some(SubscriptionStatus::Active.to_string()),
        current_period_start: from_unix_seconds(current_start).map(Some),
        current_period_end: from_unix_seconds(current_end).map(Some),
        grace_until: Some(None),
        canceled_at: None,
        updated_at: Some(now),
    }
}

/// Halted or paused: paid features stay on for a grace period past the period end.
pub fn past_due_transition(end_at: Option<i64>, now: DateTime<Utc>) -> SubscriptionTransitionEntity {
    let grace_from = from_unix_seconds(end_at).unwrap_or(now);
    SubscriptionTransitionEntity {
        status: Some(SubscriptionStatus::PastDue.to_string()),
        grace_until: Some(Some(grace_from + grace_period())),
        updated_at: Some(now),
        ..Default::default()
    }
}

/// The plan downgrade itself happens once `grace_until` passes.
pub fn cancellation_transition(now: DateTime<Utc>) -> SubscriptionTransitionEntity {
    SubscriptionTransitionEntity {
        status: Some(SubscriptionStatus::Canceled.to_string()),
        canceled_at: Some(Some(now)),
        grace_until: Some(Some(now + grace_period())),
        updated_at: Some(now),
        ..Default::default()
    }
}

pub fn is_in_grace_period(subscription: &SubscriptionEntity, now: DateTime<Utc>) -> bool {
    subscription.grace_until.is_some_and(|grace_until| grace_until > now)
}

/// Canceled or incomplete subscriptions lock paid features once grace runs out.
/// Past-due subscriptions are never locked here.
pub fn is_locked_out(subscription: &SubscriptionEntity, now: DateTime<Utc>) -> bool {
    match SubscriptionStatus::from_str(&subscription.status) {
        SubscriptionStatus::Canceled | SubscriptionStatus::Incomplete => {
            !is_in_grace_period(subscription, now)
        }
        SubscriptionStatus::Active | SubscriptionStatus::PastDue => false,
    }
}

pub fn format_minor_units(amount_minor: i64, currency: &str) -> String {
    let sign = if amount_minor < 0 { "-" } else { "" };
    let abs = amount_minor.unsigned_abs();
    format!("{currency} {sign}{}.{:02}", abs / 100, abs % 100)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptEmailData {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub invoice_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub plan: Option<String>,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DunningEmailData {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub payment_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub due_date: Option<DateTime<Utc>>,
}

/// Rendered transactional email, ready for a mail provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html_body: String,
    pub tag: String,
}

impl ReceiptEmailData {
    pub fn render(&self, app_name: &str, app_url: &str) -> EmailMessage {
        let html_body = format!(
            "<h1>Payment Receipt</h1>\
             <p>Hi {name},</p>\
             <p>Thank you for your payment!</p>\
             <h2>Invoice Details</h2>\
             <ul>\
             <li>Invoice ID: {invoice}</li>\
             <li>Amount: {amount}</li>\
             <li>Plan: {plan}</li>\
             <li>Paid At: {paid_at}</li>\
             </ul>\
             <p><a href=\"{app_url}/dashboard/settings/billing\">View Invoice</a></p>",
            name = self.name,
            invoice = self.invoice_id,
            amount = format_minor_units(self.amount_minor, &self.currency),
            plan = self.plan.as_deref().unwrap_or("N/A"),
            paid_at = self.paid_at.to_rfc3339(),
        );

        EmailMessage {
            to: self.email.clone(),
            to_name: Some(self.name.clone()),
            subject: format!("Payment receipt from {app_name}"),
            html_body,
            tag: "receipt".to_string(),
        }
    }
}

impl DunningEmailData {
    pub fn render(&self, app_url: &str) -> EmailMessage {
        let due_date = self
            .due_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let html_body = format!(
            "<h1>Payment Failed</h1>\
             <p>Hi {name},</p>\
             <p>We attempted to process your payment but it failed.</p>\
             <h2>Invoice Details</h2>\
             <ul>\
             <li>Payment ID: {payment}</li>\
             <li>Amount: {amount}</li>\
             <li>Due Date: {due_date}</li>\
             </ul>\
             <p><a href=\"{app_url}/dashboard/settings/billing\">Update Payment Method</a></p>\
             <p>Please update your payment method to avoid service interruption.</p>",
            name = self.name,
            payment = self.payment_id,
            amount = format_minor_units(self.amount_minor, &self.currency),
        );

        EmailMessage {
            to: self.email.clone(),
            to_name: Some(self.name.clone()),
            subject: "Payment failed - Action required".to_string(),
            html_body,
            tag: "dunning".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(status: &str, grace_until: Option<DateTime<Utc>>) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            gateway_subscription_id: "sub_1".to_string(),
            plan: "PRO".to_string(),
            status: status.to_string(),
            current_period_start: None,
            current_period_end: None,
            grace_until,
            canceled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn event_names_map_to_transitions() {
        assert_eq!(
            BillingEvent::from_event_name("subscription.renewed"),
            BillingEvent::SubscriptionActivated
        );
        assert_eq!(
            BillingEvent::from_event_name("subscription.paused"),
            BillingEvent::SubscriptionPastDue
        );
        assert_eq!(
            BillingEvent::from_event_name("subscription.cancelled"),
            BillingEvent::SubscriptionCanceled
        );
        assert_eq!(
            BillingEvent::from_event_name("order.paid"),
            BillingEvent::Ignored("order.paid".to_string())
        );
    }

    #[test]
    fn activation_clears_grace_and_sets_period() {
        let now = Utc::now();
        let transition = activation_transition(Some(1_700_000_000), Some(1_702_592_000), now);
        assert_eq!(transition.status.as_deref(), Some("active"));
        assert_eq!(transition.grace_until, Some(None));
        assert_eq!(
            transition.current_period_end,
            Some(from_unix_seconds(Some(1_702_592_000)))
        );
    }

    #[test]
    fn past_due_grace_runs_from_period_end_or_now() {
        let now = Utc::now();
        let end = 1_702_592_000;
        let transition = past_due_transition(Some(end), now);
        assert_eq!(
            transition.grace_until,
            Some(Some(from_unix_seconds(Some(end)).unwrap() + grace_period()))
        );

        let transition = past_due_transition(None, now);
        assert_eq!(transition.grace_until, Some(Some(now + grace_period())));
    }

    #[test]
    fn canceled_subscription_locks_out_only_after_grace() {
        let now = Utc::now();
        let in_grace = subscription("canceled", Some(now + Duration::days(2)));
        assert!(is_in_grace_period(&in_grace, now));
        assert!(!is_locked_out(&in_grace, now));

        let lapsed = subscription("canceled", Some(now - Duration::seconds(1)));
        assert!(is_locked_out(&lapsed, now));

        let past_due = subscription("past_due", None);
        assert!(!is_locked_out(&past_due, now));
    }

    #[test]
    fn minor_units_render_with_two_decimals() {
        assert_eq!(format_minor_units(199_900, "INR"), "INR 1999.00");
        assert_eq!(format_minor_units(5, "USD"), "USD 0.05");
    }
}
