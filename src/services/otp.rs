// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One-time passcode generation and validity checks.

use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, Rng};
use subtle::ConstantTimeEq;

/// How long an issued code stays valid.
pub const OTP_VALIDITY_MINUTES: i64 = 10;

const OTP_MIN: u32 = 100_000;
const OTP_MAX: u32 = 999_999;

/// Draw a six-digit code uniformly from the OS CSPRNG.
pub fn generate_otp() -> String {
    OsRng.gen_range(OTP_MIN..=OTP_MAX).to_string()
}

/// Expiry for a code issued at `now`.
pub fn expiry_from(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::minutes(OTP_VALIDITY_MINUTES)
}

/// A code is usable strictly before its expiry; there is no grace period.
pub fn is_valid(expiry: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now < expiry
}

/// Exact equality, in constant time.
pub fn codes_match(stored: &str, presented: &str) -> bool {
    stored.as_bytes().ct_eq(presented.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..1000 {
            let code = generate_otp();
            assert_eq!(code.len(), 6, "bad code {code}");
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
            let n: u32 = code.parse().unwrap();
            assert!((OTP_MIN..=OTP_MAX).contains(&n));
        }
    }

    #[test]
    fn expiry_is_ten_minutes_out() {
        let now = Utc::now();
        assert_eq!(expiry_from(now) - now, Duration::minutes(10));
    }

    #[test]
    fn validity_boundary_is_strict() {
        let expiry = Utc::now();
        assert!(is_valid(expiry, expiry - Duration::milliseconds(1)));
        assert!(!is_valid(expiry, expiry));
        assert!(!is_valid(expiry, expiry + Duration::milliseconds(1)));
    }

    #[test]
    fn code_comparison() {
        assert!(codes_match("123456", "123456"));
        assert!(!codes_match("123456", "123457"));
        assert!(!codes_match("123456", "12345"));
        assert!(!codes_match("123456", ""));
    }
}
