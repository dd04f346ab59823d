use std::sync::Arc;

use anyhow::Result;
use crates::domain::{
    entities::qr_codes::QrCodeEntity, repositories::organizations::OrganizationRepository,
    value_objects::api_keys::ApiKeyPrincipal,
};
use uuid::Uuid;

/// Ownership and organization-role checks on QR codes.
pub struct AccessPolicy {
    organization_repository: Arc<dyn OrganizationRepository + Send + Sync>,
}

impl AccessPolicy {
    pub fn new(organization_repository: Arc<dyn OrganizationRepository + Send + Sync>) -> Self {
        Self {
            organization_repository,
        }
    }

    /// Owner, or any member of the QR code's organization.
    pub async fn can_view(&self, user_id: Uuid, qr_code: &QrCodeEntity) -> Result<bool> {
        if qr_code.user_id == user_id {
            return Ok(true);
        }
        let Some(organization_id) = qr_code.organization_id else {
            return Ok(false);
        };
        Ok(self
            .organization_repository
            .find_member_role(organization_id, user_id)
            .await?
            .is_some())
    }

    /// Owner, or an admin/owner of the QR code's organization.
    pub async fn can_manage(&self, user_id: Uuid, qr_code: &QrCodeEntity) -> Result<bool> {
        if qr_code.user_id == user_id {
            return Ok(true);
        }
        let Some(organization_id) = qr_code.organization_id else {
            return Ok(false);
        };
        Ok(self
            .organization_repository
            .find_member_role(organization_id, user_id)
            .await?
            .is_some_and(|role| role.can_manage_resources()))
    }

    pub async fn is_member(&self, organization_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self
            .organization_repository
            .find_member_role(organization_id, user_id)
            .await?
            .is_some())
    }

    pub async fn can_manage_organization(&self, organization_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self
            .organization_repository
            .find_member_role(organization_id, user_id)
            .await?
            .is_some_and(|role| role.can_manage_resources()))
    }

    /// Users whose QR codes an API key may reach: its own user plus its organization's members.
    pub async fn principal_owner_ids(&self, principal: &ApiKeyPrincipal) -> Result<Vec<Uuid>> {
        let mut owner_ids: Vec<Uuid> = principal.user_id.into_iter().collect();
        if let Some(organization_id) = principal.organization_id {
            for member_id in self
                .organization_repository
                .list_member_ids(organization_id)
                .await?
            {
                if !owner_ids.contains(&member_id) {
                    owner_ids.push(member_id);
                }
            }
        }
        Ok(owner_ids)
    }

    pub async fn principal_can_access(
        &self,
        principal: &ApiKeyPrincipal,
        qr_code: &QrCodeEntity,
    ) -> Result<bool> {
        if principal.user_id == Some(qr_code.user_id) {
            return Ok(true);
        }
        if principal.organization_id.is_some() && principal.organization_id == qr_code.organization_id
        {
            return Ok(true);
        }
        Ok(self
            .principal_owner_ids(principal)
            .await?
            .contains(&qr_code.user_id))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use crates::domain::{
        repositories::organizations::MockOrganizationRepository,
        value_objects::enums::organization_roles::OrganizationRole,
    };

    pub fn sample_qr(qr_code_id: Uuid, user_id: Uuid, organization_id: Option<Uuid>) -> QrCodeEntity {
        let now = Utc::now();
        QrCodeEntity {
            id: qr_code_id,
            user_id,
            organization_id,
            url: "https://example.com".to_string(),
            title: "Menu".to_string(),
            foreground_color: "#000000".to_string(),
            background_color: "#FFFFFF".to_string(),
            dot_type: None,
            corner_type: None,
            logo_url: None,
            has_watermark: true,
            is_dynamic: false,
            dynamic_content: None,
            redirect_url: None,
            is_active: true,
            expires_at: None,
            max_scans: None,
            scan_count: 0,
            last_scanned_at: None,
            rate_limit_config: None,
            webhook_url: None,
            webhook_secret: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn policy_with_role(role: Option<OrganizationRole>) -> AccessPolicy {
        let mut organizations = MockOrganizationRepository::new();
        organizations
            .expect_find_member_role()
            .returning(move |_, _| Ok(role));
        organizations
            .expect_list_member_ids()
            .returning(|_| Ok(Vec::new()));
        AccessPolicy::new(Arc::new(organizations))
    }

    #[tokio::test]
    async fn owner_can_always_manage() {
        let owner = Uuid::new_v4();
        let qr = sample_qr(Uuid::new_v4(), owner, None);
        let policy = policy_with_role(None);
        assert!(policy.can_manage(owner, &qr).await.unwrap());
        assert!(!policy.can_view(Uuid::new_v4(), &qr).await.unwrap());
    }

    #[tokio::test]
    async fn org_members_view_but_only_admins_manage() {
        let qr = sample_qr(Uuid::new_v4(), Uuid::new_v4(), Some(Uuid::new_v4()));
        let stranger = Uuid::new_v4();

        let member = policy_with_role(Some(OrganizationRole::Member));
        assert!(member.can_view(stranger, &qr).await.unwrap());
        assert!(!member.can_manage(stranger, &qr).await.unwrap());

        let admin = policy_with_role(Some(OrganizationRole::Admin));
        assert!(admin.can_manage(stranger, &qr).await.unwrap());
    }

    #[tokio::test]
    async fn organization_keys_reach_member_owned_codes() {
        let member_id = Uuid::new_v4();
        let organization_id = Uuid::new_v4();
        let mut organizations = MockOrganizationRepository::new();
        organizations
            .expect_list_member_ids()
            .returning(move |_| Ok(vec![member_id]));
        let policy = AccessPolicy::new(Arc::new(organizations));

        let principal = ApiKeyPrincipal {
            key_id: Uuid::new_v4(),
            user_id: None,
            organization_id: Some(organization_id),
            scopes: vec!["*".to_string()],
        };
        let qr = sample_qr(Uuid::new_v4(), member_id, None);
        assert!(policy.principal_can_access(&principal, &qr).await.unwrap());

        let foreign = sample_qr(Uuid::new_v4(), Uuid::new_v4(), None);
        assert!(!policy.principal_can_access(&principal, &foreign).await.unwrap());
    }
}
