use serde::{Deserialize, Serialize};

use super::enums::plan_names::PlanName;

/// Binary feature gates derived from a plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    DynamicQr,
    Webhooks,
    CustomDomains,
    RemoveWatermark,
    RemoveAds,
    Logo,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::DynamicQr => "dynamic_qr",
            Feature::Webhooks => "webhooks",
            Feature::CustomDomains => "custom_domains",
            Feature::RemoveWatermark => "remove_watermark",
            Feature::RemoveAds => "remove_ads",
            Feature::Logo => "logo",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PlanEntitlements {
    pub max_qr_codes: i64,
    pub monthly_scans: i64,
    pub dynamic_qr_allowed: bool,
    pub webhooks_allowed: bool,
    pub custom_domains_allowed: bool,
    pub remove_watermark_allowed: bool,
    pub remove_ads_allowed: bool,
    pub logo_allowed: bool,
    pub storage_mb: i64,
    pub price_minor: i64,
}

const FREE: PlanEntitlements = PlanEntitlements {
    max_qr_codes: 10,
    monthly_scans: 1_000,
    dynamic_qr_allowed: false,
    webhooks_allowed: false,
    custom_domains_allowed: false,
    remove_watermark_allowed: false,
    remove_ads_allowed: true,
    logo_allowed: true,
    storage_mb: 100,
    price_minor: 0,
};

const FLEX: PlanEntitlements = PlanEntitlements {
    max_qr_codes: 100,
    monthly_scans: 10_000,
    dynamic_qr_allowed: true,
    webhooks_allowed: false,
    custom_domains_allowed: false,
    remove_watermark_allowed: true,
    remove_ads_allowed: true,
    logo_allowed: true,
    storage_mb: 250,
    price_minor: 0,
};

const PRO: PlanEntitlements = PlanEntitlements {
    max_qr_codes: 1_000,
    monthly_scans: 100_000,
    dynamic_qr_allowed: true,
    webhooks_allowed: true,
    custom_domains_allowed: true,
    remove_watermark_allowed: true,
    remove_ads_allowed: true,
    logo_allowed: true,
    storage_mb: 500,
    price_minor: 1_999,
};

const BUSINESS: PlanEntitlements = PlanEntitlements {
    max_qr_codes: 10_000,
    monthly_scans: 1_000_000,
    dynamic_qr_allowed: true,
    webhooks_allowed: true,
    custom_domains_allowed: true,
    remove_watermark_allowed: true,
    remove_ads_allowed: true,
    logo_allowed: true,
    storage_mb: 2_000,
    price_minor: 4_999,
};

impl PlanEntitlements {
    pub fn for_plan(plan: PlanName) -> Self {
        match plan {
            PlanName::Free => FREE,
            PlanName::Flex => FLEX,
            PlanName::Pro => PRO,
            PlanName::Business => BUSINESS,
        }
    }

    pub fn allows(&self, feature: Feature) -> bool {
        match feature {
            Feature::DynamicQr => self.dynamic_qr_allowed,
            Feature::Webhooks => self.webhooks_allowed,
            Feature::CustomDomains => self.custom_domains_allowed,
            Feature::RemoveWatermark => self.remove_watermark_allowed,
            Feature::RemoveAds => self.remove_ads_allowed,
            Feature::Logo => self.logo_allowed,
        }
    }
}

pub fn has_feature(plan: PlanName, feature: Feature) -> bool {
    PlanEntitlements::for_plan(plan).allows(feature)
}

/// Cheapest plan that unlocks `feature`, used in upgrade hints.
pub fn minimum_plan_for(feature: Feature) -> PlanName {
    [PlanName::Free, PlanName::Flex, PlanName::Pro, PlanName::Business]
        .into_iter()
        .find(|plan| has_feature(*plan, feature))
        .unwrap_or(PlanName::Business)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub qr_codes: i64,
    pub scans_this_month: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitlementsDto {
    pub plan: PlanName,
    pub entitlements: PlanEntitlements,
    pub usage: UsageSnapshot,
}
