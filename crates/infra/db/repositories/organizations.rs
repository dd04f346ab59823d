use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::organization_members},
};
use domain::{
    repositories::organizations::OrganizationRepository,
    value_objects::enums::organization_roles::OrganizationRole,
};

pub struct OrganizationPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl OrganizationPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl OrganizationRepository for OrganizationPostgres {
    async fn find_member_role(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<OrganizationRole>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let role = organization_members::table
            .filter(organization_members::organization_id.eq(organization_id))
            .filter(organization_members::user_id.eq(user_id))
            .select(organization_members::role)
            .first::<String>(&mut conn)
            .optional()?;

        Ok(role.as_deref().map(OrganizationRole::from_str))
    }

    async fn list_member_ids(&self, organization_id: Uuid) -> Result<Vec<Uuid>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let member_ids = organization_members::table
            .filter(organization_members::organization_id.eq(organization_id))
            .select(organization_members::user_id)
            .load::<Uuid>(&mut conn)?;

        Ok(member_ids)
    }
}
