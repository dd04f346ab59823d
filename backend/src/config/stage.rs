use std::fmt::Display;

use anyhow::{Result, anyhow};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Local,
    Development,
    Production,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            Stage::Local => "Local",
            Stage::Development => "Development",
            Stage::Production => "Production",
        };
        write!(f, "{}", stage)
    }
}

impl TryFrom<&String> for Stage {
    type Error = anyhow::Error;

    fn try_from(value: &String) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Stage::Local),
            "development" | "dev" => Ok(Stage::Development),
            "production" | "prod" => Ok(Stage::Production),
            other => Err(anyhow!("unknown stage '{other}'")),
        }
    }
}

impl Stage {
    /// Internal error messages and details reach clients outside production only.
    pub fn exposes_internal_errors(&self) -> bool {
        !matches!(self, Stage::Production)
    }
}
