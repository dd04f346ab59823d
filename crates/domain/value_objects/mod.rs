pub mod api_keys;
pub mod billing;
pub mod bulk;
pub mod credits;
pub mod enums;
pub mod plans;
pub mod qr_codes;
pub mod rate_limits;
pub mod scans;
pub mod validation;
pub mod webhooks;
