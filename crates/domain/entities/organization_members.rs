use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::organization_members;

#[derive(Debug, Clone, Selectable, Queryable)]
#[diesel(table_name = organization_members)]
pub struct OrganizationMemberEntity {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
}
