//! Sample records for a fresh installation.
//!
//! Seeding is keyed on `license_no`, so running it again refreshes the same
//! five records instead of duplicating them. Two of them expire relative to
//! the seeding day so the dashboard always has something expiring soon.

use chrono::{Duration, NaiveDate};
use dlms_shared::constants::{PHOTO_BUCKET, SIGNATURE_BUCKET};
use dlms_shared::types::LicenseForm;
use dlms_shared::validation::validate_license;
use dlms_store::{Database, ImageUrls};
use tracing::info;

use crate::blob_store::BlobStore;
use crate::error::ServerError;

struct Sample {
    cnic: &'static str,
    name: &'static str,
    father_name: &'static str,
    address: &'static str,
    height: &'static str,
    blood_group: &'static str,
    date_of_birth: &'static str,
    license_no: &'static str,
    license_types: &'static [&'static str],
    issue_city: &'static str,
    valid_from: &'static str,
    valid_to: ValidTo,
    photo: &'static str,
    signature: &'static str,
}

enum ValidTo {
    Fixed(&'static str),
    DaysFromToday(i64),
}

const SAMPLES: [Sample; 5] = [
    Sample {
        cnic: "12345-1234567-1",
        name: "Muhammad Ahmed",
        father_name: "Khalid Ahmed",
        address: "123 Main Street, Islamabad, Pakistan",
        height: "5'10\"",
        blood_group: "O+",
        date_of_birth: "1990-05-15",
        license_no: "ISB-DL-2023-001",
        license_types: &["mcycle", "carjeep"],
        issue_city: "islamabad",
        valid_from: "2023-01-01",
        valid_to: ValidTo::Fixed("2028-01-01"),
        photo: "sample/male1.jpg",
        signature: "sample/signature1.png",
    },
    Sample {
        cnic: "54321-7654321-2",
        name: "Fatima Khan",
        father_name: "Ibrahim Khan",
        address: "456 Park Avenue, Lahore, Pakistan",
        height: "5'4\"",
        blood_group: "A+",
        date_of_birth: "1995-08-20",
        license_no: "LHR-DL-2023-002",
        license_types: &["carjeep"],
        issue_city: "lahore",
        valid_from: "2022-05-15",
        valid_to: ValidTo::DaysFromToday(25),
        photo: "sample/female1.jpg",
        signature: "sample/signature2.png",
    },
    Sample {
        cnic: "98765-4321098-3",
        name: "Ali Hassan",
        father_name: "Farooq Hassan",
        address: "789 Garden Road, Karachi, Pakistan",
        height: "5'8\"",
        blood_group: "B-",
        date_of_birth: "1988-03-12",
        license_no: "KHI-DL-2023-003",
        license_types: &["mcycle", "carjeep", "ltv"],
        issue_city: "karachi",
        valid_from: "2020-10-01",
        valid_to: ValidTo::Fixed("2022-10-01"),
        photo: "sample/male2.jpg",
        signature: "sample/signature3.png",
    },
    Sample {
        cnic: "13579-2468013-4",
        name: "Ayesha Malik",
        father_name: "Tariq Malik",
        address: "101 University Road, Peshawar, Pakistan",
        height: "5'6\"",
        blood_group: "AB+",
        date_of_birth: "1992-11-30",
        license_no: "PSH-DL-2023-004",
        license_types: &["carjeep", "htv"],
        issue_city: "peshawar",
        valid_from: "2023-03-15",
        valid_to: ValidTo::Fixed("2028-03-15"),
        photo: "sample/female2.jpg",
        signature: "sample/signature4.png",
    },
    Sample {
        cnic: "24680-1357924-5",
        name: "Usman Ali",
        father_name: "Zafar Ali",
        address: "202 Railway Colony, Quetta, Pakistan",
        height: "6'0\"",
        blood_group: "O-",
        date_of_birth: "1985-07-22",
        license_no: "QTA-DL-2023-005",
        license_types: &["mcycle"],
        issue_city: "quetta",
        valid_from: "2021-12-01",
        valid_to: ValidTo::DaysFromToday(15),
        photo: "sample/male3.jpg",
        signature: "sample/signature5.png",
    },
];

impl Sample {
    fn form(&self, today: NaiveDate) -> LicenseForm {
        let valid_to = match self.valid_to {
            ValidTo::Fixed(date) => date.to_string(),
            ValidTo::DaysFromToday(days) => (today + Duration::days(days)).to_string(),
        };
        LicenseForm {
            cnic: self.cnic.into(),
            name: self.name.into(),
            father_name: self.father_name.into(),
            address: self.address.into(),
            height: self.height.into(),
            blood_group: self.blood_group.into(),
            date_of_birth: self.date_of_birth.into(),
            license_no: self.license_no.into(),
            license_types: self.license_types.iter().map(|t| t.to_string()).collect(),
            issue_city: self.issue_city.into(),
            valid_from: self.valid_from.into(),
            valid_to,
        }
    }
}

/// Insert or refresh the sample records. Returns how many were written.
pub fn seed_sample_data(db: &Database, blobs: &BlobStore, today: NaiveDate) -> Result<usize, ServerError> {
    for sample in &SAMPLES {
        let data = validate_license(&sample.form(today))?;
        let urls = ImageUrls {
            image_url: Some(blobs.public_url(PHOTO_BUCKET, sample.photo)),
            signature_url: Some(blobs.public_url(SIGNATURE_BUCKET, sample.signature)),
        };
        db.upsert_by_license_no(&data, &urls)?;
    }

    info!(count = SAMPLES.len(), "Seeded sample licenses");
    Ok(SAMPLES.len())
}
