use std::time::Duration;

use uuid::Uuid;

pub const USER_CREDITS_TTL: Duration = Duration::from_secs(60);
pub const USER_PLAN_TTL: Duration = Duration::from_secs(300);
pub const QR_CODE_TTL: Duration = Duration::from_secs(300);
pub const QR_LIST_TTL: Duration = Duration::from_secs(60);
pub const API_KEY_TTL: Duration = Duration::from_secs(300);
pub const SCAN_STATS_TTL: Duration = Duration::from_secs(120);

/// List pages invalidated after a write; deeper pages expire on their own.
pub const INVALIDATED_LIST_PAGES: i64 = 10;

pub fn user_credits(user_id: Uuid) -> String {
    format!("user:{user_id}:credits")
}

pub fn user_plan(user_id: Uuid) -> String {
    format!("user:{user_id}:plan")
}

pub fn qr_code(qr_code_id: Uuid) -> String {
    format!("qr:{qr_code_id}")
}

pub fn qr_code_list(user_id: Uuid, page: i64) -> String {
    format!("qr:list:{user_id}:{page}")
}

pub fn api_key(key_hash: &str) -> String {
    format!("apikey:{key_hash}")
}

pub fn scan_stats(qr_code_id: Uuid) -> String {
    format!("stats:{qr_code_id}")
}
