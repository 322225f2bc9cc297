//! License status rules.
//!
//! A license's status is never stored: it is derived from `valid_to` and the
//! current time. `valid_to` is taken as midnight UTC of that date.
//!
//! Two windows exist and they are deliberately different:
//! - the status warning window is three *calendar* months ahead of now;
//! - the dashboard widget counts licenses expiring within a literal 30 days.

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DASHBOARD_EXPIRY_WINDOW_DAYS, EXPIRY_WARNING_MONTHS};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    Active,
    ExpiringSoon,
    Expired,
}

impl LicenseStatus {
    pub fn label(&self) -> &'static str {
        match self {
            LicenseStatus::Active => "Active",
            LicenseStatus::ExpiringSoon => "Expiring Soon",
            LicenseStatus::Expired => "Expired",
        }
    }
}

/// The instant a license stops being valid.
pub fn expiry_instant(valid_to: NaiveDate) -> DateTime<Utc> {
    valid_to.and_time(chrono::NaiveTime::MIN).and_utc()
}

pub fn status_at(valid_to: NaiveDate, now: DateTime<Utc>) -> LicenseStatus {
    let expiry = expiry_instant(valid_to);

    if expiry < now {
        return LicenseStatus::Expired;
    }

    match now.checked_add_months(Months::new(EXPIRY_WARNING_MONTHS)) {
        Some(warning_limit) if expiry >= warning_limit => LicenseStatus::Active,
        _ => LicenseStatus::ExpiringSoon,
    }
}

pub fn status(valid_to: NaiveDate) -> LicenseStatus {
    status_at(valid_to, Utc::now())
}

/// Whole days until expiry, rounded up. Negative once expired: a license
/// that lapsed less than a day ago reports `-1`, never `0`.
pub fn days_remaining_at(valid_to: NaiveDate, now: DateTime<Utc>) -> i64 {
    let diff_ms = (expiry_instant(valid_to) - now).num_milliseconds();
    let days = -(-diff_ms).div_euclid(MILLIS_PER_DAY);

    if diff_ms < 0 && days == 0 {
        -1
    } else {
        days
    }
}

pub fn days_remaining(valid_to: NaiveDate) -> i64 {
    days_remaining_at(valid_to, Utc::now())
}

/// Dashboard rule: `now < valid_to <= now + 30 days`.
pub fn expires_within_dashboard_window(valid_to: NaiveDate, now: DateTime<Utc>) -> bool {
    let expiry = expiry_instant(valid_to);
    expiry > now && expiry <= now + Duration::days(DASHBOARD_EXPIRY_WINDOW_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 9, 30, 0).unwrap()
    }

    fn today() -> NaiveDate {
        now().date_naive()
    }

    #[test]
    fn test_expiring_in_ten_days() {
        let valid_to = today() + Duration::days(10);
        assert_eq!(status_at(valid_to, now()), LicenseStatus::ExpiringSoon);
        assert_eq!(days_remaining_at(valid_to, now()), 10);
    }

    #[test]
    fn test_expired_five_days_ago() {
        let valid_to = today() - Duration::days(5);
        assert_eq!(status_at(valid_to, now()), LicenseStatus::Expired);
        assert_eq!(days_remaining_at(valid_to, now()), -5);
    }

    #[test]
    fn test_active_far_future() {
        let valid_to = today() + Duration::days(400);
        assert_eq!(status_at(valid_to, now()), LicenseStatus::Active);
        assert!(days_remaining_at(valid_to, now()) > 0);
    }

    #[test]
    fn test_warning_window_uses_calendar_months() {
        // 2026-03-15 09:30 + 3 months = 2026-06-15 09:30.
        let limit_day = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
        assert_eq!(status_at(limit_day, now()), LicenseStatus::ExpiringSoon);

        let after = NaiveDate::from_ymd_opt(2026, 6, 16).unwrap();
        assert_eq!(status_at(after, now()), LicenseStatus::Active);

        // 91 days from now is still inside March + 3 months.
        let ninety_one = today() + Duration::days(91);
        assert_eq!(ninety_one, NaiveDate::from_ymd_opt(2026, 6, 14).unwrap());
        assert_eq!(status_at(ninety_one, now()), LicenseStatus::ExpiringSoon);
    }

    #[test]
    fn test_month_end_clamps() {
        let now = Utc.with_ymd_and_hms(2026, 11, 30, 0, 0, 0).unwrap();
        // 2026-11-30 + 3 months clamps to 2027-02-28.
        let clamp = NaiveDate::from_ymd_opt(2027, 2, 28).unwrap();
        assert_eq!(status_at(clamp, now), LicenseStatus::Active);
        let before = NaiveDate::from_ymd_opt(2027, 2, 27).unwrap();
        assert_eq!(status_at(before, now), LicenseStatus::ExpiringSoon);
    }

    #[test]
    fn test_expiry_boundary_is_inclusive_of_now() {
        let midnight = Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap();
        assert_eq!(status_at(today(), midnight), LicenseStatus::ExpiringSoon);
        assert_eq!(days_remaining_at(today(), midnight), 0);
    }

    #[test]
    fn test_lapsed_today_is_negative() {
        // Expired at midnight, now is 09:30 the same day.
        assert_eq!(status_at(today(), now()), LicenseStatus::Expired);
        assert_eq!(days_remaining_at(today(), now()), -1);
    }

    #[test]
    fn test_negative_days_iff_expired() {
        for offset in -800..800 {
            let valid_to = today() + Duration::days(offset);
            let expired = status_at(valid_to, now()) == LicenseStatus::Expired;
            assert_eq!(
                days_remaining_at(valid_to, now()) < 0,
                expired,
                "offset {offset}"
            );
        }
    }

    #[test]
    fn test_dashboard_window_is_literal_days() {
        let at_limit = today() + Duration::days(30);
        // Midnight of day 30 is before now + 30 days (09:30).
        assert!(expires_within_dashboard_window(at_limit, now()));
        let past_limit = today() + Duration::days(31);
        assert!(!expires_within_dashboard_window(past_limit, now()));
        assert!(!expires_within_dashboard_window(today(), now()));

        // Outside the dashboard window yet still ExpiringSoon by status.
        let sixty = today() + Duration::days(60);
        assert!(!expires_within_dashboard_window(sixty, now()));
        assert_eq!(status_at(sixty, now()), LicenseStatus::ExpiringSoon);
    }
}
