//! Store-side companions to the shared license model.

use serde::{Deserialize, Serialize};

pub use dlms_shared::types::{License, LicenseData};

/// Public URLs of a record's uploaded images.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageUrls {
    pub image_url: Option<String>,
    pub signature_url: Option<String>,
}

impl ImageUrls {
    pub fn of(license: &License) -> Self {
        Self {
            image_url: license.image_url.clone(),
            signature_url: license.signature_url.clone(),
        }
    }
}
