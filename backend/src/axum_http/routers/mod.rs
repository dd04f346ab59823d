pub mod admin;
pub mod api_keys;
pub mod billing_webhook;
pub mod bulk;
pub mod qr_codes;
pub mod scans;
pub mod user;
pub mod webhooks_v1;
