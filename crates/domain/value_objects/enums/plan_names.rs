use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanName {
    #[default]
    Free,
    Flex,
    Pro,
    Business,
}

impl Display for PlanName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let plan = match self {
            PlanName::Free => "FREE",
            PlanName::Flex => "FLEX",
            PlanName::Pro => "PRO",
            PlanName::Business => "BUSINESS",
        };
        write!(f, "{}", plan)
    }
}

impl PlanName {
    /// Unknown or legacy plan names resolve to the free tier.
    pub fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "FLEX" => PlanName::Flex,
            "PRO" => PlanName::Pro,
            "BUSINESS" => PlanName::Business,
            _ => PlanName::Free,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_plan_names_fall_back_to_free() {
        assert_eq!(PlanName::from_str("pro"), PlanName::Pro);
        assert_eq!(PlanName::from_str(" Business "), PlanName::Business);
        assert_eq!(PlanName::from_str("ENTERPRISE"), PlanName::Free);
        assert_eq!(PlanName::from_str(""), PlanName::Free);
    }
}
