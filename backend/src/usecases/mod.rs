pub mod access;
pub mod api_keys;
pub mod billing_webhook;
pub mod bulk;
pub mod credits;
pub mod entitlements;
pub mod qr_codes;
pub mod rate_limiter;
pub mod scans;
pub mod side_effects;
pub mod webhook_outbox;
