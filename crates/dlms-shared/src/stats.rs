//! Dashboard aggregates computed over the full license list.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::RECENT_ACTIVITY_LEN;
use crate::status::expires_within_dashboard_window;
use crate::types::{BloodGroup, License, LicenseType};

/// Cities shown on the dashboard map, with their province.
pub const DASHBOARD_CITIES: [(&str, &str); 10] = [
    ("Islamabad", "Federal"),
    ("Karachi", "Sindh"),
    ("Lahore", "Punjab"),
    ("Peshawar", "KPK"),
    ("Quetta", "Balochistan"),
    ("Faisalabad", "Punjab"),
    ("Multan", "Punjab"),
    ("Hyderabad", "Sindh"),
    ("Rawalpindi", "Punjab"),
    ("Gujranwala", "Punjab"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    pub license_type: LicenseType,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodGroupCount {
    pub blood_group: BloodGroup,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityCount {
    pub name: String,
    pub province: String,
    pub count: usize,
}

/// Province slices of the dashboard pie, in display order.
pub const PROVINCES: [&str; 5] = ["Punjab", "Sindh", "KPK", "Balochistan", "Federal"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvinceCount {
    pub province: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_licenses: usize,
    pub processed_today: usize,
    pub license_types: Vec<TypeCount>,
    /// Only groups that occur at least once.
    pub blood_groups: Vec<BloodGroupCount>,
    pub cities: Vec<CityCount>,
    /// Sums over `cities`; only provinces with at least one license.
    pub provinces: Vec<ProvinceCount>,
    /// Index 0 = January.
    pub issued_by_month: [usize; 12],
    pub expiring_next_30_days: usize,
    pub recent: Vec<License>,
}

impl DashboardSummary {
    /// `records` are expected newest first, as the store lists them.
    pub fn compute(records: &[License], now: DateTime<Utc>) -> Self {
        let today = now.date_naive();

        let license_types = LicenseType::ALL
            .into_iter()
            .map(|license_type| TypeCount {
                license_type,
                count: records
                    .iter()
                    .filter(|l| l.data.license_types.contains(&license_type))
                    .count(),
            })
            .collect();

        let blood_groups = BloodGroup::ALL
            .into_iter()
            .map(|blood_group| BloodGroupCount {
                blood_group,
                count: records
                    .iter()
                    .filter(|l| l.data.blood_group == blood_group)
                    .count(),
            })
            .filter(|c| c.count > 0)
            .collect();

        let cities: Vec<CityCount> = DASHBOARD_CITIES
            .iter()
            .map(|(name, province)| CityCount {
                name: name.to_string(),
                province: province.to_string(),
                count: records
                    .iter()
                    .filter(|l| l.data.issue_city.eq_ignore_ascii_case(name))
                    .count(),
            })
            .collect();

        let provinces = PROVINCES
            .iter()
            .map(|province| ProvinceCount {
                province: province.to_string(),
                count: cities
                    .iter()
                    .filter(|c| c.province == *province)
                    .map(|c| c.count)
                    .sum(),
            })
            .filter(|p| p.count > 0)
            .collect();

        let mut issued_by_month = [0usize; 12];
        for license in records {
            issued_by_month[license.created_at.month0() as usize] += 1;
        }

        Self {
            total_licenses: records.len(),
            processed_today: records
                .iter()
                .filter(|l| l.created_at.date_naive() == today)
                .count(),
            license_types,
            blood_groups,
            cities,
            provinces,
            issued_by_month,
            expiring_next_30_days: records
                .iter()
                .filter(|l| expires_within_dashboard_window(l.data.valid_to, now))
                .count(),
            recent: records.iter().take(RECENT_ACTIVITY_LEN).cloned().collect(),
        }
    }

    pub fn count_for_type(&self, license_type: LicenseType) -> usize {
        self.license_types
            .iter()
            .find(|c| c.license_type == license_type)
            .map(|c| c.count)
            .unwrap_or(0)
    }
}
