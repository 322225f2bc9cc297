//! License writes: validate, upload images, then write the record.
//!
//! Image uploads and the record write are not atomic. When a later step
//! fails, the objects uploaded earlier in the same request are removed
//! again; objects belonging to previously saved records are never touched.

use chrono::Utc;
use dlms_shared::error::ValidationErrors;
use dlms_shared::types::{License, LicenseData, LicenseForm};
use dlms_shared::upload::{decode_data_url, CheckedImage};
use dlms_shared::validation::{validate_submission, ImagePolicy};
use dlms_store::{Database, ImageUrls, StoreError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::AppState;
use crate::blob_store::BlobStore;
use crate::error::ServerError;

/// An incoming create or update.
#[derive(Debug, Clone)]
pub struct Submission {
    pub form: LicenseForm,
    pub image_base64: Option<String>,
    pub signature_base64: Option<String>,
}

/// Objects written during one request.
struct UploadBatch<'a> {
    store: &'a BlobStore,
    written: Vec<(&'static str, String)>,
}

impl<'a> UploadBatch<'a> {
    fn new(store: &'a BlobStore) -> Self {
        Self {
            store,
            written: Vec::new(),
        }
    }

    async fn put(&mut self, image: &CheckedImage, cnic: &str, millis: i64) -> Result<String, ServerError> {
        let bucket = image.kind.bucket();
        let path = image.kind.object_path(cnic, millis);
        let url = self.store.upload(bucket, &path, &image.bytes).await?;
        self.written.push((bucket, path));
        Ok(url)
    }

    async fn rollback(self) {
        for (bucket, path) in self.written {
            match self.store.remove(bucket, &path).await {
                Ok(()) => debug!(bucket, path = %path, "Removed orphaned upload"),
                Err(e) => warn!(bucket, path = %path, error = %e, "Failed to remove orphaned upload"),
            }
        }
    }
}

/// Decode the two optional data URLs, reporting bad encodings per field.
fn decode_images(submission: &Submission) -> (Option<Vec<u8>>, Option<Vec<u8>>, ValidationErrors) {
    let mut errors = ValidationErrors::new();
    let mut decode = |field: &str, value: &Option<String>| match value.as_deref() {
        None => None,
        Some(s) if s.trim().is_empty() => None,
        Some(s) => match decode_data_url(s) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                errors.push(field, e.to_string());
                None
            }
        },
    };
    let photo = decode("image", &submission.image_base64);
    let signature = decode("signature", &submission.signature_base64);
    (photo, signature, errors)
}

async fn upload_and_write<F>(
    state: &AppState,
    submission: Submission,
    policy: ImagePolicy,
    mut urls: ImageUrls,
    write: F,
) -> Result<License, ServerError>
where
    F: FnOnce(&Database, &LicenseData, &ImageUrls) -> Result<License, StoreError>,
{
    let (photo, signature, decode_errors) = decode_images(&submission);
    let checked = validate_submission(
        &submission.form,
        photo,
        signature,
        policy,
        state.config.max_image_size,
    );
    let checked = match checked {
        Ok(checked) if decode_errors.is_empty() => checked,
        Ok(_) => return Err(decode_errors.into()),
        Err(mut errors) => {
            // A field that failed to decode is reported once, not also as missing.
            errors.errors.retain(|e| !decode_errors.has(&e.field));
            errors.errors.extend(decode_errors.errors);
            return Err(errors.into());
        }
    };

    let millis = Utc::now().timestamp_millis();
    let mut batch = UploadBatch::new(&state.blob_store);

    for (image, slot) in [
        (&checked.photo, &mut urls.image_url),
        (&checked.signature, &mut urls.signature_url),
    ] {
        if let Some(image) = image {
            match batch.put(image, &checked.data.cnic, millis).await {
                Ok(url) => *slot = Some(url),
                Err(e) => {
                    batch.rollback().await;
                    return Err(e);
                }
            }
        }
    }

    let written = {
        let db = state.db.lock().await;
        write(&*db, &checked.data, &urls)
    };

    match written {
        Ok(license) => Ok(license),
        Err(e) => {
            batch.rollback().await;
            Err(e.into())
        }
    }
}

/// Validate, upload both images and insert a new record.
pub async fn create(state: &AppState, submission: Submission) -> Result<License, ServerError> {
    let license = upload_and_write(
        state,
        submission,
        ImagePolicy::Required,
        ImageUrls::default(),
        |db, data, urls| db.insert_license(data, urls),
    )
    .await?;

    info!(id = %license.id, license_no = %license.data.license_no, "License created");
    Ok(license)
}

/// Replace the editable fields of `id`. Images that are not resubmitted
/// keep their current URLs.
pub async fn update(state: &AppState, id: Uuid, submission: Submission) -> Result<License, ServerError> {
    let existing = {
        let db = state.db.lock().await;
        db.get_license(id)?
    };

    let license = upload_and_write(
        state,
        submission,
        ImagePolicy::Optional,
        ImageUrls::of(&existing),
        |db, data, urls| db.update_license(id, data, urls),
    )
    .await?;

    info!(id = %license.id, license_no = %license.data.license_no, "License updated");
    Ok(license)
}

/// Delete the record. Its images stay in their buckets.
pub async fn delete(state: &AppState, id: Uuid) -> Result<(), ServerError> {
    let deleted = {
        let db = state.db.lock().await;
        db.delete_license(id)?
    };
    if !deleted {
        return Err(ServerError::NotFound("License not found".to_string()));
    }

    info!(id = %id, "License deleted");
    Ok(())
}
