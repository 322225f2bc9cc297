//! CRUD operations for [`License`] records.

use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use dlms_shared::types::{BloodGroup, LicenseType};

use crate::database::Database;
use crate::error::Result;
use crate::models::{ImageUrls, License, LicenseData};

const LICENSE_COLUMNS: &str = "id, cnic, name, father_name, address, height, blood_group, \
     date_of_birth, license_no, license_types, issue_city, valid_from, valid_to, \
     image_url, signature_url, created_at";

const DATE_FORMAT: &str = "%Y-%m-%d";

fn date_text(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

// Fixed-width so lexical order matches chronological order.
fn timestamp_text(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new license. The store assigns `id` and `created_at`.
    pub fn insert_license(&self, data: &LicenseData, urls: &ImageUrls) -> Result<License> {
        let license = License {
            id: Uuid::new_v4(),
            data: data.clone(),
            image_url: urls.image_url.clone(),
            signature_url: urls.signature_url.clone(),
            created_at: Utc::now().trunc_subsecs(6),
        };

        self.conn().execute(
            &format!(
                "INSERT INTO licenses ({LICENSE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
            ),
            params![
                license.id.to_string(),
                data.cnic,
                data.name,
                data.father_name,
                data.address,
                data.height,
                data.blood_group.as_str(),
                date_text(data.date_of_birth),
                data.license_no,
                serde_json::to_string(&data.license_types)?,
                data.issue_city,
                date_text(data.valid_from),
                date_text(data.valid_to),
                license.image_url,
                license.signature_url,
                timestamp_text(license.created_at),
            ],
        )?;

        tracing::debug!(id = %license.id, license_no = %data.license_no, "inserted license");
        Ok(license)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single license by id.
    pub fn get_license(&self, id: Uuid) -> Result<License> {
        let license = self.conn().query_row(
            &format!("SELECT {LICENSE_COLUMNS} FROM licenses WHERE id = ?1"),
            params![id.to_string()],
            row_to_license,
        )?;
        Ok(license)
    }

    pub fn find_by_license_no(&self, license_no: &str) -> Result<Option<License>> {
        let license = self
            .conn()
            .query_row(
                &format!("SELECT {LICENSE_COLUMNS} FROM licenses WHERE license_no = ?1"),
                params![license_no],
                row_to_license,
            )
            .optional()?;
        Ok(license)
    }

    /// List all licenses, newest first.
    pub fn list_licenses(&self) -> Result<Vec<License>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {LICENSE_COLUMNS}
             FROM licenses
             ORDER BY created_at DESC, rowid DESC"
        ))?;

        let rows = stmt.query_map([], row_to_license)?;

        let mut licenses = Vec::new();
        for row in rows {
            licenses.push(row?);
        }
        Ok(licenses)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Replace every editable field and both image URLs of a license.
    pub fn update_license(&self, id: Uuid, data: &LicenseData, urls: &ImageUrls) -> Result<License> {
        let affected = self.conn().execute(
            "UPDATE licenses SET
                cnic = ?2, name = ?3, father_name = ?4, address = ?5, height = ?6,
                blood_group = ?7, date_of_birth = ?8, license_no = ?9, license_types = ?10,
                issue_city = ?11, valid_from = ?12, valid_to = ?13,
                image_url = ?14, signature_url = ?15
             WHERE id = ?1",
            params![
                id.to_string(),
                data.cnic,
                data.name,
                data.father_name,
                data.address,
                data.height,
                data.blood_group.as_str(),
                date_text(data.date_of_birth),
                data.license_no,
                serde_json::to_string(&data.license_types)?,
                data.issue_city,
                date_text(data.valid_from),
                date_text(data.valid_to),
                urls.image_url,
                urls.signature_url,
            ],
        )?;

        if affected == 0 {
            return Err(crate::StoreError::NotFound);
        }

        self.get_license(id)
    }

    /// Insert, or replace the record sharing `data.license_no`. Used for
    /// seeding.
    pub fn upsert_by_license_no(&self, data: &LicenseData, urls: &ImageUrls) -> Result<License> {
        match self.find_by_license_no(&data.license_no)? {
            Some(existing) => self.update_license(existing.id, data, urls),
            None => self.insert_license(data, urls),
        }
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a license by id.  Returns `true` if a row was deleted.
    /// Uploaded images are left where they are.
    pub fn delete_license(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM licenses WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
}

fn date_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

/// Map a `rusqlite::Row` to a [`License`].
fn row_to_license(row: &rusqlite::Row<'_>) -> rusqlite::Result<License> {
    let id_str: String = row.get(0)?;
    let blood_str: String = row.get(6)?;
    let types_json: String = row.get(9)?;
    let created_str: String = row.get(15)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| conversion_error(0, e))?;
    let blood_group = blood_str
        .parse::<BloodGroup>()
        .map_err(|e| conversion_error(6, e))?;
    let license_types: Vec<LicenseType> =
        serde_json::from_str(&types_json).map_err(|e| conversion_error(9, e))?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(15, e))?;

    Ok(License {
        id,
        data: LicenseData {
            cnic: row.get(1)?,
            name: row.get(2)?,
            father_name: row.get(3)?,
            address: row.get(4)?,
            height: row.get(5)?,
            blood_group,
            date_of_birth: date_column(row, 7)?,
            license_no: row.get(8)?,
            license_types,
            issue_city: row.get(10)?,
            valid_from: date_column(row, 11)?,
            valid_to: date_column(row, 12)?,
        },
        image_url: row.get(13)?,
        signature_url: row.get(14)?,
        created_at,
    })
}
