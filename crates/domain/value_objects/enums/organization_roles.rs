use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationRole {
    Owner,
    Admin,
    Member,
}

impl Display for OrganizationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let role = match self {
            OrganizationRole::Owner => "owner",
            OrganizationRole::Admin => "admin",
            OrganizationRole::Member => "member",
        };
        write!(f, "{}", role)
    }
}

impl OrganizationRole {
    pub fn from_str(value: &str) -> Self {
        match value {
            "owner" => OrganizationRole::Owner,
            "admin" => OrganizationRole::Admin,
            _ => OrganizationRole::Member,
        }
    }

    pub fn can_manage_resources(&self) -> bool {
        matches!(self, OrganizationRole::Owner | OrganizationRole::Admin)
    }
}
