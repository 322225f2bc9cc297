//! The license form schema.
//!
//! Both the client (before any network call) and the server (before any
//! write) run submissions through [`validate_submission`], so the two can
//! never disagree about what a valid record is.

use chrono::NaiveDate;

use crate::constants::{MIN_ADDRESS_LEN, MIN_NAME_LEN};
use crate::error::ValidationErrors;
use crate::types::{canonical_city, BloodGroup, LicenseData, LicenseForm, LicenseType};
use crate::upload::{check_image, CheckedImage, ImageKind};

/// Whether a submission must carry both images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePolicy {
    /// Create: photo and signature are mandatory.
    Required,
    /// Edit: a missing image keeps the stored one.
    Optional,
}

/// A submission that passed every check.
#[derive(Debug, Clone)]
pub struct ValidatedSubmission {
    pub data: LicenseData,
    pub photo: Option<CheckedImage>,
    pub signature: Option<CheckedImage>,
}

/// `NNNNN-NNNNNNN-N`
pub fn is_valid_cnic(cnic: &str) -> bool {
    let bytes = cnic.as_bytes();
    bytes.len() == 15
        && bytes.iter().enumerate().all(|(i, b)| match i {
            5 | 13 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

fn is_person_name(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c.is_whitespace())
}

fn parse_date(errors: &mut ValidationErrors, field: &str, label: &str, value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        errors.push(field, format!("{label} is required"));
        return None;
    }
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            errors.push(field, format!("{label} must be a date (YYYY-MM-DD)"));
            None
        }
    }
}

fn check_name(errors: &mut ValidationErrors, field: &str, label: &str, value: &str) {
    if value.chars().count() < MIN_NAME_LEN {
        errors.push(field, format!("{label} must be at least {MIN_NAME_LEN} characters"));
    } else if !is_person_name(value) {
        errors.push(field, format!("{label} must contain only alphabets"));
    }
}

fn require(errors: &mut ValidationErrors, field: &str, label: &str, value: &str) {
    if value.is_empty() {
        errors.push(field, format!("{label} is required"));
    }
}

/// Check the text fields of a form and produce typed license data.
pub fn validate_license(form: &LicenseForm) -> Result<LicenseData, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let cnic = form.cnic.trim();
    if !is_valid_cnic(cnic) {
        errors.push("cnic", "Invalid CNIC format");
    }

    let name = form.name.trim();
    check_name(&mut errors, "name", "Name", name);
    let father_name = form.father_name.trim();
    check_name(&mut errors, "father_name", "Father's name", father_name);

    let address = form.address.trim();
    if address.chars().count() < MIN_ADDRESS_LEN {
        errors.push(
            "address",
            format!("Address must be at least {MIN_ADDRESS_LEN} characters"),
        );
    }

    let height = form.height.trim();
    require(&mut errors, "height", "Height", height);

    let blood_group = if form.blood_group.trim().is_empty() {
        errors.push("blood_group", "Blood group is required");
        None
    } else {
        match form.blood_group.parse::<BloodGroup>() {
            Ok(group) => Some(group),
            Err(_) => {
                errors.push("blood_group", "Unknown blood group");
                None
            }
        }
    };

    let date_of_birth = parse_date(&mut errors, "date_of_birth", "Date of birth", &form.date_of_birth);

    let license_no = form.license_no.trim();
    require(&mut errors, "license_no", "License number", license_no);

    let mut license_types: Vec<LicenseType> = Vec::new();
    if form.license_types.is_empty() {
        errors.push("license_types", "Select at least one license type");
    }
    for raw in &form.license_types {
        match raw.parse::<LicenseType>() {
            Ok(t) if !license_types.contains(&t) => license_types.push(t),
            Ok(_) => {}
            Err(_) => errors.push("license_types", format!("Unknown license type: {raw}")),
        }
    }

    let issue_city = if form.issue_city.trim().is_empty() {
        errors.push("issue_city", "Issue city is required");
        None
    } else {
        let city = canonical_city(&form.issue_city);
        if city.is_none() {
            errors.push("issue_city", "Unknown issue city");
        }
        city
    };

    let valid_from = parse_date(&mut errors, "valid_from", "Valid from date", &form.valid_from);
    let valid_to = parse_date(&mut errors, "valid_to", "Valid to date", &form.valid_to);

    match (blood_group, date_of_birth, issue_city, valid_from, valid_to) {
        (Some(blood_group), Some(date_of_birth), Some(issue_city), Some(valid_from), Some(valid_to))
            if errors.is_empty() =>
        {
            Ok(LicenseData {
                cnic: cnic.to_string(),
                name: name.to_string(),
                father_name: father_name.to_string(),
                address: address.to_string(),
                height: height.to_string(),
                blood_group,
                date_of_birth,
                license_no: license_no.to_string(),
                license_types,
                issue_city,
                valid_from,
                valid_to,
            })
        }
        _ => Err(errors),
    }
}

/// Validate a whole submission: text fields plus photo and signature bytes.
///
/// All problems are reported together, the way a form shows every invalid
/// field at once.
pub fn validate_submission(
    form: &LicenseForm,
    photo: Option<Vec<u8>>,
    signature: Option<Vec<u8>>,
    policy: ImagePolicy,
    max_image_size: usize,
) -> Result<ValidatedSubmission, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let data = match validate_license(form) {
        Ok(data) => Some(data),
        Err(field_errors) => {
            errors.errors.extend(field_errors.errors);
            None
        }
    };

    let mut check = |kind: ImageKind, bytes: Option<Vec<u8>>, label: &str| match bytes {
        Some(bytes) => match check_image(kind, bytes, max_image_size) {
            Ok(image) => Some(image),
            Err(e) => {
                errors.push(kind.field(), e.to_string());
                None
            }
        },
        None => {
            if policy == ImagePolicy::Required {
                errors.push(kind.field(), format!("{label} is required"));
            }
            None
        }
    };

    let photo = check(ImageKind::Photo, photo, "Image");
    let signature = check(ImageKind::Signature, signature, "Signature");

    match data {
        Some(data) if errors.is_empty() => Ok(ValidatedSubmission {
            data,
            photo,
            signature,
        }),
        _ => Err(errors),
    }
}
