use crate::types::License;

/// Case-insensitive substring match on CNIC, license number or name.
pub fn matches(license: &License, needle_lower: &str) -> bool {
    [
        &license.data.cnic,
        &license.data.license_no,
        &license.data.name,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(needle_lower))
}

/// Filter `records` by `term`, keeping their order. A blank term keeps
/// everything.
pub fn search<'a>(records: &'a [License], term: &str) -> Vec<&'a License> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return records.iter().collect();
    }
    records.iter().filter(|l| matches(l, &needle)).collect()
}
