use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Blood group
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodGroup {
    /// Dashboard order.
    pub const ALL: [BloodGroup; 8] = [
        BloodGroup::APositive,
        BloodGroup::ANegative,
        BloodGroup::BPositive,
        BloodGroup::BNegative,
        BloodGroup::AbPositive,
        BloodGroup::AbNegative,
        BloodGroup::OPositive,
        BloodGroup::ONegative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BloodGroup::APositive => "A+",
            BloodGroup::ANegative => "A-",
            BloodGroup::BPositive => "B+",
            BloodGroup::BNegative => "B-",
            BloodGroup::AbPositive => "AB+",
            BloodGroup::AbNegative => "AB-",
            BloodGroup::OPositive => "O+",
            BloodGroup::ONegative => "O-",
        }
    }
}

impl FromStr for BloodGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        BloodGroup::ALL
            .into_iter()
            .find(|g| g.as_str() == wanted)
            .ok_or_else(|| format!("unknown blood group: {s}"))
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// License type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseType {
    Mcycle,
    Carjeep,
    Ltv,
    Htv,
}

impl LicenseType {
    pub const ALL: [LicenseType; 4] = [
        LicenseType::Mcycle,
        LicenseType::Carjeep,
        LicenseType::Ltv,
        LicenseType::Htv,
    ];

    /// Types offered by the create/edit forms. LTV and HTV only appear on
    /// records loaded from elsewhere (seed data).
    pub const FORM_CHOICES: [LicenseType; 2] = [LicenseType::Mcycle, LicenseType::Carjeep];

    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseType::Mcycle => "mcycle",
            LicenseType::Carjeep => "carjeep",
            LicenseType::Ltv => "ltv",
            LicenseType::Htv => "htv",
        }
    }

    /// Label printed on the license card.
    pub fn label(&self) -> &'static str {
        match self {
            LicenseType::Mcycle => "M.CYCLE",
            LicenseType::Carjeep => "CAR/JEEP",
            LicenseType::Ltv => "LTV",
            LicenseType::Htv => "HTV",
        }
    }
}

impl FromStr for LicenseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        LicenseType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown license type: {s}"))
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Issuing cities
// ---------------------------------------------------------------------------

/// Cities a license can be issued in, sorted. Stored lower-cased.
pub const ISSUE_CITIES: [&str; 44] = [
    "Abbottabad",
    "Attock",
    "Bahawalnagar",
    "Bahawalpur",
    "Burewala",
    "Charsadda",
    "Chiniot",
    "Dera Ghazi Khan",
    "Dera Ismail Khan",
    "Faisalabad",
    "Gujranwala",
    "Gujrat",
    "Hafizabad",
    "Hyderabad",
    "Islamabad",
    "Jacobabad",
    "Jhang",
    "Kamoke",
    "Karachi",
    "Kasur",
    "Khairpur",
    "Khanewal",
    "Khuzdar",
    "Kohat",
    "Lahore",
    "Larkana",
    "Mardan",
    "Mingora",
    "Mirpur Khas",
    "Multan",
    "Muzaffargarh",
    "Nawabshah",
    "Okara",
    "Peshawar",
    "Quetta",
    "Rahim Yar Khan",
    "Rawalpindi",
    "Sadiqabad",
    "Sahiwal",
    "Sargodha",
    "Sheikhupura",
    "Sialkot",
    "Sukkur",
    "Wah Cantonment",
];

/// Map user input onto the stored (lower-cased) city key.
pub fn canonical_city(input: &str) -> Option<String> {
    let wanted = input.trim();
    ISSUE_CITIES
        .iter()
        .find(|c| c.eq_ignore_ascii_case(wanted))
        .map(|c| c.to_lowercase())
}

/// Display name for a stored city key; falls back to the key itself.
pub fn city_display_name(key: &str) -> &str {
    ISSUE_CITIES
        .iter()
        .find(|c| c.eq_ignore_ascii_case(key))
        .copied()
        .unwrap_or(key)
}

// ---------------------------------------------------------------------------
// License record
// ---------------------------------------------------------------------------

/// The editable fields of a license, already checked against the shared
/// schema (see [`crate::validation`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LicenseData {
    pub cnic: String,
    pub name: String,
    pub father_name: String,
    pub address: String,
    pub height: String,
    pub blood_group: BloodGroup,
    pub date_of_birth: NaiveDate,
    pub license_no: String,
    pub license_types: Vec<LicenseType>,
    pub issue_city: String,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
}

/// A persisted license row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct License {
    pub id: Uuid,
    #[serde(flatten)]
    pub data: LicenseData,
    pub image_url: Option<String>,
    pub signature_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Raw, unchecked license fields as they arrive from a form or request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LicenseForm {
    pub cnic: String,
    pub name: String,
    pub father_name: String,
    pub address: String,
    pub height: String,
    pub blood_group: String,
    pub date_of_birth: String,
    pub license_no: String,
    pub license_types: Vec<String>,
    pub issue_city: String,
    pub valid_from: String,
    pub valid_to: String,
}

impl From<&LicenseData> for LicenseForm {
    fn from(data: &LicenseData) -> Self {
        Self {
            cnic: data.cnic.clone(),
            name: data.name.clone(),
            father_name: data.father_name.clone(),
            address: data.address.clone(),
            height: data.height.clone(),
            blood_group: data.blood_group.to_string(),
            date_of_birth: data.date_of_birth.format("%Y-%m-%d").to_string(),
            license_no: data.license_no.clone(),
            license_types: data
                .license_types
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
            issue_city: data.issue_city.clone(),
            valid_from: data.valid_from.format("%Y-%m-%d").to_string(),
            valid_to: data.valid_to.format("%Y-%m-%d").to_string(),
        }
    }
}

impl From<&License> for LicenseForm {
    fn from(license: &License) -> Self {
        Self::from(&license.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blood_group_parse() {
        assert_eq!("ab-".parse::<BloodGroup>().unwrap(), BloodGroup::AbNegative);
        assert_eq!(" O+ ".parse::<BloodGroup>().unwrap(), BloodGroup::OPositive);
        assert!("C+".parse::<BloodGroup>().is_err());
    }

    #[test]
    fn test_blood_group_serde() {
        let json = serde_json::to_string(&BloodGroup::AbPositive).unwrap();
        assert_eq!(json, "\"AB+\"");
    }

    #[test]
    fn test_license_type_labels() {
        assert_eq!(LicenseType::Mcycle.label(), "M.CYCLE");
        assert_eq!(LicenseType::Carjeep.label(), "CAR/JEEP");
        assert_eq!("HTV".parse::<LicenseType>().unwrap(), LicenseType::Htv);
    }

    #[test]
    fn test_canonical_city() {
        assert_eq!(canonical_city("Rahim Yar Khan").as_deref(), Some("rahim yar khan"));
        assert_eq!(canonical_city("lahore").as_deref(), Some("lahore"));
        assert_eq!(canonical_city("Springfield"), None);
        assert_eq!(city_display_name("dera ghazi khan"), "Dera Ghazi Khan");
    }

    #[test]
    fn test_license_json_is_flat() {
        let license = License {
            id: Uuid::new_v4(),
            data: LicenseData {
                cnic: "12345-1234567-1".into(),
                name: "Muhammad Ahmed".into(),
                father_name: "Khalid Ahmed".into(),
                address: "123 Main Street, Islamabad".into(),
                height: "5'10\"".into(),
                blood_group: BloodGroup::OPositive,
                date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 15).unwrap(),
                license_no: "ISB-DL-2023-001".into(),
                license_types: vec![LicenseType::Mcycle, LicenseType::Carjeep],
                issue_city: "islamabad".into(),
                valid_from: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
                valid_to: NaiveDate::from_ymd_opt(2028, 1, 1).unwrap(),
            },
            image_url: None,
            signature_url: None,
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&license).unwrap();
        assert_eq!(value["cnic"], "12345-1234567-1");
        assert_eq!(value["valid_to"], "2028-01-01");
        assert_eq!(value["license_types"][1], "carjeep");

        let back: License = serde_json::from_value(value).unwrap();
        assert_eq!(back, license);
    }
}
