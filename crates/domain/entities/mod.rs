pub mod api_keys;
pub mod bulk_groups;
pub mod invoices;
pub mod organization_members;
pub mod qr_code_scans;
pub mod qr_codes;
pub mod rate_limits;
pub mod subscriptions;
pub mod users;
pub mod webhook_logs;
