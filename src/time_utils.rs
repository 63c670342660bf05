// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and age arithmetic.

use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc};

/// Youngest age allowed to hold an account.
pub const MINIMUM_AGE_YEARS: i32 = 13;

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a date of birth.
///
/// Accepts `YYYY-MM-DD`, or an RFC 3339 timestamp whose date part is used.
pub fn parse_dob(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
}

/// Whole years between `dob` and `today`, decremented when the birthday
/// has not yet come around this year.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    years
}

/// Whether someone born on `dob` is at least [`MINIMUM_AGE_YEARS`] on `today`.
pub fn meets_minimum_age(dob: NaiveDate, today: NaiveDate) -> bool {
    age_on(dob, today) >= MINIMUM_AGE_YEARS
}
