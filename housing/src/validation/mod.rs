//! JSON Schema validation for emitted transactions.
//!
//! The transaction schema (`schemas/transaction.json`, Draft 7) is embedded at
//! compile time. It fixes the key set of an output line, the value types, the
//! required address/date/coordinate keys and coordinate ranges.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use housing::validation::is_valid_transaction;
//!
//! let line = json!({
//!     "土地區段位置或建物區門牌": "臺北市中正區忠孝西路一段1~30號",
//!     "交易年月日": 1490918400,
//!     "Lat": 25.0478,
//!     "Lng": 121.517
//! });
//! assert!(is_valid_transaction(&line));
//! ```

use std::io::BufRead;

use once_cell::sync::Lazy;
use serde_json::Value;

static TRANSACTION_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/transaction.json")).expect("Invalid embedded schema")
});

/// Validate a JSON value against a schema.
///
/// Returns every error message when invalid.
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema).map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator.iter_errors(data).map(|e| e.to_string()).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// The embedded transaction schema
pub fn transaction_schema() -> &'static Value {
    &TRANSACTION_SCHEMA
}

/// Validate one output record.
pub fn validate_transaction(data: &Value) -> Result<(), Vec<String>> {
    validate(&TRANSACTION_SCHEMA, data)
}

pub fn is_valid_transaction(data: &Value) -> bool {
    is_valid(&TRANSACTION_SCHEMA, data)
}

/// Outcome of checking a JSON-lines file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub lines: usize,
    /// 1-indexed line number and its errors
    pub invalid: Vec<(usize, Vec<String>)>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.invalid.is_empty()
    }
}

/// Check every non-blank line of a JSON-lines stream against the transaction schema.
///
/// A line that is not JSON is reported as invalid, not as an I/O failure.
pub fn validate_lines<R: BufRead>(reader: R) -> std::io::Result<ValidationReport> {
    let mut report = ValidationReport::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        report.lines += 1;

        let result = serde_json::from_str::<Value>(&line)
            .map_err(|e| vec![format!("not JSON: {}", e)])
            .and_then(|value| validate_transaction(&value));
        if let Err(errors) = result {
            report.invalid.push((idx + 1, errors));
        }
    }
    Ok(report)
}
