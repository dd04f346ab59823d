use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infra::db::postgres::schema::api_rate_limit_events;

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = api_rate_limit_events)]
pub struct InsertRateLimitEventEntity {
    pub key: String,
    pub route: String,
    pub requested_at: DateTime<Utc>,
}
