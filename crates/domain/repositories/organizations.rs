use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::enums::organization_roles::OrganizationRole;

#[automock]
#[async_trait]
pub trait OrganizationRepository {
    async fn find_member_role(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<OrganizationRole>>;
    async fn list_member_ids(&self, organization_id: Uuid) -> Result<Vec<Uuid>>;
}
