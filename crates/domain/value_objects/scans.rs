use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::qr_code_scans::{InsertQrCodeScanEntity, QrCodeScanEntity};

/// Request metadata captured for a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanContext {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device: String,
    pub browser: String,
    pub os: String,
}

impl DeviceInfo {
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();

        let device = if ua.contains("ipad") || ua.contains("tablet") {
            "tablet"
        } else if ua.contains("mobi") || ua.contains("iphone") || ua.contains("android") {
            "mobile"
        } else {
            "desktop"
        };

        let browser = if ua.contains("edg/") {
            "Edge"
        } else if ua.contains("opr/") || ua.contains("opera") {
            "Opera"
        } else if ua.contains("chrome/") || ua.contains("crios/") {
            "Chrome"
        } else if ua.contains("firefox/") || ua.contains("fxios/") {
            "Firefox"
        } else if ua.contains("safari/") {
            "Safari"
        } else {
            "Other"
        };

        let os = if ua.contains("windows") {
            "Windows"
        } else if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ios") {
            "iOS"
        } else if ua.contains("android") {
            "Android"
        } else if ua.contains("mac os") || ua.contains("macintosh") {
            "macOS"
        } else if ua.contains("linux") {
            "Linux"
        } else {
            "Other"
        };

        Self {
            device: device.to_string(),
            browser: browser.to_string(),
            os: os.to_string(),
        }
    }
}

impl ScanContext {
    pub fn into_insert_entity(self, qr_code_id: Uuid, scanned_at: DateTime<Utc>) -> InsertQrCodeScanEntity {
        let device_info = self.user_agent.as_deref().map(DeviceInfo::from_user_agent);
        InsertQrCodeScanEntity {
            qr_code_id,
            user_agent: self.user_agent,
            ip_address: self.ip_address,
            country: self.country,
            city: self.city,
            device: device_info.as_ref().map(|d| d.device.clone()),
            browser: device_info.as_ref().map(|d| d.browser.clone()),
            os: device_info.map(|d| d.os),
            scanned_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanResultDto {
    pub success: bool,
    pub scan_id: Uuid,
    pub redirect_url: String,
}

/// Body posted to a QR code's outbound webhook after each scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanWebhookPayload {
    pub qr_code_id: Uuid,
    pub scan_id: Uuid,
    pub user_agent: Option<String>,
    pub device: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub redirect_url: String,
    pub ab_test_variant: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ScanWebhookPayload {
    pub fn from_scan(scan: &QrCodeScanEntity, redirect_url: &str) -> Self {
        Self {
            qr_code_id: scan.qr_code_id,
            scan_id: scan.id,
            user_agent: scan.user_agent.clone(),
            device: scan.device.clone(),
            country: scan.country.clone(),
            city: scan.city.clone(),
            redirect_url: redirect_url.to_string(),
            ab_test_variant: None,
            timestamp: scan.scanned_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecentScanDto {
    pub id: Uuid,
    pub device: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanAnalyticsDto {
    pub total_scans: usize,
    pub unique_devices: usize,
    pub unique_countries: usize,
    pub unique_cities: usize,
    pub scans_by_date: BTreeMap<String, usize>,
    pub scans_by_device: BTreeMap<String, usize>,
    pub scans_by_country: BTreeMap<String, usize>,
    pub recent_scans: Vec<RecentScanDto>,
}

const RECENT_SCAN_LIMIT: usize = 10;

/// Aggregates one bulk fetch of scans, newest first.
pub fn aggregate_scans(scans: &[QrCodeScanEntity]) -> ScanAnalyticsDto {
    let mut devices = HashSet::new();
    let mut countries = HashSet::new();
    let mut cities = HashSet::new();
    let mut scans_by_date = BTreeMap::new();
    let mut scans_by_device = BTreeMap::new();
    let mut scans_by_country = BTreeMap::new();

    for scan in scans {
        let device = scan.device.clone().unwrap_or_else(|| "unknown".to_string());
        let country = scan.country.clone().unwrap_or_else(|| "unknown".to_string());

        if let Some(city) = &scan.city {
            cities.insert(city.clone());
        }
        devices.insert(device.clone());
        countries.insert(country.clone());

        *scans_by_date
            .entry(scan.scanned_at.format("%Y-%m-%d").to_string())
            .or_insert(0) += 1;
        *scans_by_device.entry(device).or_insert(0) += 1;
        *scans_by_country.entry(country).or_insert(0) += 1;
    }

    let mut recent: Vec<&QrCodeScanEntity> = scans.iter().collect();
    recent.sort_by(|a, b| b.scanned_at.cmp(&a.scanned_at));

    ScanAnalyticsDto {
        total_scans: scans.len(),
        unique_devices: devices.len(),
        unique_countries: countries.len(),
        unique_cities: cities.len(),
        scans_by_date,
        scans_by_device,
        scans_by_country,
        recent_scans: recent
            .into_iter()
            .take(RECENT_SCAN_LIMIT)
            .map(|scan| RecentScanDto {
                id: scan.id,
                device: scan.device.clone(),
                country: scan.country.clone(),
                city: scan.city.clone(),
                scanned_at: scan.scanned_at,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn scan(device: &str, country: &str, city: Option<&str>, at: DateTime<Utc>) -> QrCodeScanEntity {
        QrCodeScanEntity {
            id: Uuid::new_v4(),
            qr_code_id: Uuid::nil(),
            user_agent: None,
            ip_address: None,
            country: Some(country.to_string()),
            city: city.map(str::to_string),
            device: Some(device.to_string()),
            browser: None,
            os: None,
            scanned_at: at,
        }
    }

    #[test]
    fn parses_common_user_agents() {
        let iphone = DeviceInfo::from_user_agent(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Version/17.0 Mobile/15E148 Safari/604.1",
        );
        assert_eq!(iphone.device, "mobile");
        assert_eq!(iphone.os, "iOS");
        assert_eq!(iphone.browser, "Safari");

        let desktop = DeviceInfo::from_user_agent(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36",
        );
        assert_eq!(desktop.device, "desktop");
        assert_eq!(desktop.os, "Windows");
        assert_eq!(desktop.browser, "Chrome");
    }

    #[test]
    fn aggregates_counts_and_keeps_ten_most_recent() {
        let now = Utc::now();
        let mut scans = Vec::new();
        for i in 0..12 {
            scans.push(scan(
                if i % 2 == 0 { "mobile" } else { "desktop" },
                if i < 6 { "IN" } else { "US" },
                Some(if i < 3 { "Pune" } else { "Austin" }),
                now - Duration::hours(i),
            ));
        }

        let analytics = aggregate_scans(&scans);
        assert_eq!(analytics.total_scans, 12);
        assert_eq!(analytics.unique_devices, 2);
        assert_eq!(analytics.unique_countries, 2);
        assert_eq!(analytics.unique_cities, 2);
        assert_eq!(analytics.scans_by_device["mobile"], 6);
        assert_eq!(analytics.scans_by_country["US"], 6);
        assert_eq!(analytics.recent_scans.len(), 10);
        assert_eq!(analytics.recent_scans[0].scanned_at, now);
    }
}
