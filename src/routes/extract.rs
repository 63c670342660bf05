// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON body extraction with field validation.

use crate::error::AppError;
use crate::time_utils::{meets_minimum_age, parse_dob, MINIMUM_AGE_YEARS};
use axum::{
    extract::{FromRequest, Request},
    Json,
};
use chrono::Utc;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::sync::LazyLock;
use validator::{Validate, ValidationError, ValidationErrors};

/// Longest accepted display name.
pub const MAX_NAME_LEN: usize = 100;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// `Json<T>` that also runs `T::validate()`. Both malformed JSON and failed
/// validation become a 400 `validation_error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;

        value
            .validate()
            .map_err(|errors| AppError::Validation(describe(&errors)))?;

        Ok(Self(value))
    }
}

/// One message per failing field, sorted by field name.
fn describe(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .iter()
        .filter_map(|(field, errs)| {
            errs.first().map(|e| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// `local@domain.tld` with no whitespace and exactly one `@`. Surrounding
/// whitespace is ignored; it is trimmed before storage.
pub fn validate_email(raw: &str) -> Result<(), ValidationError> {
    if EMAIL_RE.is_match(raw.trim()) {
        Ok(())
    } else {
        Err(invalid("email", "Please provide a valid email"))
    }
}

/// Exactly six ASCII digits.
pub fn validate_otp(raw: &str) -> Result<(), ValidationError> {
    if raw.len() == 6 && raw.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(invalid("otp", "OTP must be exactly 6 digits"))
    }
}

pub fn validate_name(raw: &str) -> Result<(), ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(invalid("name", "Name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::new("name").with_message(Cow::Owned(format!(
            "Name must be at most {} characters",
            MAX_NAME_LEN
        ))));
    }
    Ok(())
}

/// A real calendar date at least [`MINIMUM_AGE_YEARS`] before today.
pub fn validate_dob(raw: &str) -> Result<(), ValidationError> {
    let dob = parse_dob(raw).ok_or_else(|| {
        invalid("dob", "Date of birth must be a valid date (YYYY-MM-DD)")
    })?;

    if !meets_minimum_age(dob, Utc::now().date_naive()) {
        let mut err = invalid("dob", "You must be at least 13 years old");
        err.add_param(Cow::Borrowed("min_age"), &MINIMUM_AGE_YEARS);
        return Err(err);
    }
    Ok(())
}
