//! Read-only render models for one license: the detail page and the
//! printable card.

use chrono::{DateTime, NaiveDate, Utc};
use dlms_shared::status::{days_remaining_at, status_at, LicenseStatus};
use dlms_shared::types::{city_display_name, License};
use serde::Serialize;
use uuid::Uuid;

/// "January 1, 2028"
pub fn long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// "Jan 1, 2028"
pub fn short_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LicenseView {
    pub id: Uuid,
    pub name: String,
    pub father_name: String,
    pub cnic: String,
    pub address: String,
    pub height: String,
    pub blood_group: &'static str,
    pub date_of_birth: String,
    pub license_no: String,
    pub license_types: Vec<&'static str>,
    pub issue_city: String,
    pub valid_from: String,
    pub valid_to: String,
    pub status: LicenseStatus,
    pub status_label: &'static str,
    pub days_remaining: i64,
    pub image_url: Option<String>,
    pub signature_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LicenseView {
    pub fn at(license: &License, now: DateTime<Utc>) -> Self {
        let data = &license.data;
        let status = status_at(data.valid_to, now);
        Self {
            id: license.id,
            name: data.name.clone(),
            father_name: data.father_name.clone(),
            cnic: data.cnic.clone(),
            address: data.address.clone(),
            height: data.height.clone(),
            blood_group: data.blood_group.as_str(),
            date_of_birth: long_date(data.date_of_birth),
            license_no: data.license_no.clone(),
            license_types: data.license_types.iter().map(|t| t.label()).collect(),
            issue_city: city_display_name(&data.issue_city).to_string(),
            valid_from: long_date(data.valid_from),
            valid_to: long_date(data.valid_to),
            status,
            status_label: status.label(),
            days_remaining: days_remaining_at(data.valid_to, now),
            image_url: license.image_url.clone(),
            signature_url: license.signature_url.clone(),
            created_at: license.created_at,
        }
    }

    pub fn new(license: &License) -> Self {
        Self::at(license, Utc::now())
    }

    /// "Expires in 10 days", "Expires today", "Expired 5 days ago".
    pub fn remaining_text(&self) -> String {
        match self.days_remaining {
            d if d > 1 => format!("Expires in {d} days"),
            1 => "Expires in 1 day".to_string(),
            0 => "Expires today".to_string(),
            -1 => "Expired 1 day ago".to_string(),
            d => format!("Expired {} days ago", -d),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrintCard {
    pub title: &'static str,
    pub license_no: String,
    pub name: String,
    pub father_name: String,
    pub cnic: String,
    pub date_of_birth: String,
    pub blood_group: &'static str,
    pub height: String,
    pub address: String,
    pub valid_from: String,
    pub valid_to: String,
    pub license_types: Vec<&'static str>,
    pub photo_url: Option<String>,
    pub signature_url: Option<String>,
    pub issued_by: String,
}

impl PrintCard {
    pub fn new(license: &License) -> Self {
        let data = &license.data;
        Self {
            title: "DRIVING LICENSE",
            license_no: data.license_no.clone(),
            name: data.name.clone(),
            father_name: data.father_name.clone(),
            cnic: data.cnic.clone(),
            date_of_birth: data.date_of_birth.to_string(),
            blood_group: data.blood_group.as_str(),
            height: data.height.clone(),
            address: data.address.clone(),
            valid_from: short_date(data.valid_from),
            valid_to: short_date(data.valid_to),
            license_types: data.license_types.iter().map(|t| t.label()).collect(),
            photo_url: license.image_url.clone(),
            signature_url: license.signature_url.clone(),
            issued_by: format!(
                "Issued by the Traffic Police, {}",
                city_display_name(&data.issue_city)
            ),
        }
    }
}
