//! v001 -- Initial schema creation.
//!
//! Creates the `licenses` table.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS licenses (
    id            TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    cnic          TEXT NOT NULL,              -- NNNNN-NNNNNNN-N
    name          TEXT NOT NULL,
    father_name   TEXT NOT NULL,
    address       TEXT NOT NULL,
    height        TEXT NOT NULL,
    blood_group   TEXT NOT NULL,              -- A+, AB-, ...
    date_of_birth TEXT NOT NULL,              -- YYYY-MM-DD
    license_no    TEXT NOT NULL UNIQUE,       -- natural key for seeding
    license_types TEXT NOT NULL,              -- JSON array of type keys
    issue_city    TEXT NOT NULL,              -- lower-cased
    valid_from    TEXT NOT NULL,              -- YYYY-MM-DD
    valid_to      TEXT NOT NULL,              -- YYYY-MM-DD
    image_url     TEXT,
    signature_url TEXT,
    created_at    TEXT NOT NULL               -- RFC-3339, UTC
);

CREATE INDEX IF NOT EXISTS idx_licenses_created_at ON licenses(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_licenses_cnic ON licenses(cnic);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
