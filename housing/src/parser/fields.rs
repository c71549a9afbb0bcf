//! Field extraction for one row.
//!
//! The `parse_*` functions convert a single raw value and return a
//! [`FieldError`] tagged with the column label. [`FieldParser`] wraps them for
//! filling a whole record in column order: the first failure is kept, every
//! later call returns its sentinel without parsing, and [`FieldParser::finish`]
//! surfaces that first failure once all columns have been visited.

use crate::error::{FieldError, FieldErrorKind, FieldResult};

use super::roc_date::roc_to_unix;

/// Returned by numeric and date extraction after a failure.
pub const SENTINEL: i64 = -1;

/// Returned by float extraction after a failure.
pub const SENTINEL_F64: f64 = -1.0;

pub fn parse_int(raw: &str, field: &'static str) -> FieldResult<i64> {
    raw.parse::<i64>()
        .map_err(|e| FieldError::new(field, raw, e))
}

/// `NaN` and infinities are rejected; they have no JSON representation.
pub fn parse_float(raw: &str, field: &'static str) -> FieldResult<f64> {
    let value = raw.parse::<f64>().map_err(|e| FieldError::new(field, raw, e))?;
    if !value.is_finite() {
        return Err(FieldError::new(field, raw, FieldErrorKind::NonFinite));
    }
    Ok(value)
}

pub fn parse_date(raw: &str, field: &'static str) -> FieldResult<i64> {
    roc_to_unix(raw).map_err(|e| FieldError::new(field, raw, e))
}

/// An empty value is "not present", not an error.
pub fn parse_optional_date(raw: &str, field: &'static str) -> FieldResult<Option<i64>> {
    if raw.is_empty() {
        return Ok(None);
    }
    parse_date(raw, field).map(Some)
}

/// Sticky-error accumulator over the fields of one row.
///
/// One instance per row; never shared.
#[derive(Debug, Default)]
pub struct FieldParser {
    error: Option<FieldError>,
}

impl FieldParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn int(&mut self, raw: &str, field: &'static str) -> i64 {
        self.track(SENTINEL, || parse_int(raw, field))
    }

    pub fn float(&mut self, raw: &str, field: &'static str) -> f64 {
        self.track(SENTINEL_F64, || parse_float(raw, field))
    }

    pub fn date(&mut self, raw: &str, field: &'static str) -> i64 {
        self.track(SENTINEL, || parse_date(raw, field))
    }

    pub fn optional_date(&mut self, raw: &str, field: &'static str) -> Option<i64> {
        self.track(None, || parse_optional_date(raw, field))
    }

    /// The first failure, if any.
    pub fn error(&self) -> Option<&FieldError> {
        self.error.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Surface the first failure.
    pub fn finish(self) -> FieldResult<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn track<T>(&mut self, sentinel: T, parse: impl FnOnce() -> FieldResult<T>) -> T {
        if self.error.is_some() {
            return sentinel;
        }
        match parse() {
            Ok(value) => value,
            Err(err) => {
                self.error = Some(err);
                sentinel
            }
        }
    }
}
