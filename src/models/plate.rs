//! Plate number normalization and format validation.
//!
//! The inference service is asked to answer with a bare plate string, but
//! nothing forces it to. Every candidate goes through [`PlateNumber::parse`]
//! before it can touch the session store.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Indian registration format: 2 letters, 2 digits, 1-2 letters, 4 digits.
static INDIAN_PLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z]{2}[0-9]{2}[A-Z]{1,2}[0-9]{4}$").expect("plate regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateFormat {
    /// Normalized text must match the Indian registration template.
    Strict,
    /// Any non-empty alphanumeric string is accepted.
    Lenient,
}

impl PlateFormat {
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict {
            PlateFormat::Strict
        } else {
            PlateFormat::Lenient
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlateError {
    #[error("plate text is empty")]
    Empty,

    #[error("'{0}' does not match the expected plate format")]
    BadFormat(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlateNumber(String);

impl PlateNumber {
    /// Uppercases `raw`, drops everything that is not ASCII alphanumeric and
    /// checks the result against `format`.
    pub fn parse(raw: &str, format: PlateFormat) -> Result<Self, PlateError> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return Err(PlateError::Empty);
        }
        if format == PlateFormat::Strict && !INDIAN_PLATE.is_match(&normalized) {
            return Err(PlateError::BadFormat(normalized));
        }
        Ok(PlateNumber(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlateNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
