//! The in-memory license list behind the licenses page.

use chrono::{DateTime, Utc};
use dlms_shared::search::search;
use dlms_shared::status::{status_at, LicenseStatus};
use dlms_shared::types::License;
use serde::Serialize;
use uuid::Uuid;

/// One table row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LicenseRow {
    pub id: Uuid,
    pub license_no: String,
    pub name: String,
    pub cnic: String,
    pub license_types: Vec<&'static str>,
    pub status: LicenseStatus,
    pub status_label: &'static str,
}

impl LicenseRow {
    pub fn at(license: &License, now: DateTime<Utc>) -> Self {
        let status = status_at(license.data.valid_to, now);
        Self {
            id: license.id,
            license_no: license.data.license_no.clone(),
            name: license.data.name.clone(),
            cnic: license.data.cnic.clone(),
            license_types: license.data.license_types.iter().map(|t| t.label()).collect(),
            status,
            status_label: status.label(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LicenseList {
    records: Vec<License>,
    term: String,
}

impl LicenseList {
    /// `records` newest first, as the server lists them.
    pub fn new(records: Vec<License>) -> Self {
        Self {
            records,
            term: String::new(),
        }
    }

    pub fn replace(&mut self, records: Vec<License>) {
        self.records = records;
    }

    pub fn records(&self) -> &[License] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn set_search(&mut self, term: &str) {
        self.term = term.to_string();
    }

    pub fn search_term(&self) -> &str {
        &self.term
    }

    /// Records matching the current search term, in list order.
    pub fn visible(&self) -> Vec<&License> {
        search(&self.records, &self.term)
    }

    pub fn rows_at(&self, now: DateTime<Utc>) -> Vec<LicenseRow> {
        self.visible()
            .into_iter()
            .map(|l| LicenseRow::at(l, now))
            .collect()
    }

    pub fn get(&self, id: Uuid) -> Option<&License> {
        self.records.iter().find(|l| l.id == id)
    }

    /// Drop a deleted record without refetching. The rest keep their order.
    pub fn remove(&mut self, id: Uuid) -> Option<License> {
        let idx = self.records.iter().position(|l| l.id == id)?;
        Some(self.records.remove(idx))
    }
}
