//! Error types for the housing ingest pipeline.
//!
//! This module defines the error hierarchy, leaf errors first:
//!
//! - [`DateError`] - ROC calendar conversion errors
//! - [`FieldError`] - a single column failed to parse
//! - [`HeaderError`], [`TableError`], [`ScanError`] - file-level errors
//! - [`CacheError`] - geocode cache seeding and write-back errors
//! - [`RowError`] - a row failed hard (field parsing or geocoding)
//! - [`PipelineError`] - top-level orchestration errors
//! - [`PublishError`] - message store client errors
//!
//! [`GeocodeError`] lives next to the resolver in [`crate::geocode`].
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;

use thiserror::Error;

use crate::geocode::GeocodeError;
use crate::models::RowId;

// =============================================================================
// Calendar Errors
// =============================================================================

/// Errors converting a ROC calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    /// Length or shape matches none of the known encodings.
    #[error("invalid ROC date '{0}'")]
    Format(String),

    /// A year, month or day component is not a number.
    #[error("invalid {part} in ROC date '{input}'")]
    Component { input: String, part: &'static str },

    /// The components do not name a real calendar day.
    #[error("invalid date '{input}' ({year:04}-{month:02}-{day:02})")]
    Invalid {
        input: String,
        year: i32,
        month: i32,
        day: i32,
    },
}

// =============================================================================
// Field Errors
// =============================================================================

/// Why a field value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldErrorKind {
    #[error("not an integer: {0}")]
    Integer(#[from] std::num::ParseIntError),

    #[error("not a number: {0}")]
    Float(#[from] std::num::ParseFloatError),

    #[error("not a finite number")]
    NonFinite,

    #[error(transparent)]
    Date(#[from] DateError),
}

/// A column of a row failed to parse. Tagged with the column label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field {field} (value '{value}'): {kind}")]
pub struct FieldError {
    pub field: &'static str,
    pub value: String,
    #[source]
    pub kind: FieldErrorKind,
}

impl FieldError {
    pub fn new(field: &'static str, value: impl Into<String>, kind: impl Into<FieldErrorKind>) -> Self {
        Self {
            field,
            value: value.into(),
            kind: kind.into(),
        }
    }
}

// =============================================================================
// File Errors
// =============================================================================

/// Header row does not match the fixed column schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("number of columns {found} not equal to {expected}")]
    ColumnCount { found: usize, expected: usize },

    #[error("column {index} '{found}' not equal to '{expected}'")]
    ColumnName {
        index: usize,
        found: String,
        expected: &'static str,
    },
}

/// Errors tokenizing decoded CSV content.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("file has no header row")]
    Empty,

    #[error("unexpected header: {0}")]
    Header(#[from] HeaderError),
}

/// File-level errors. Always fatal to the file they occur in.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Table {
        path: PathBuf,
        #[source]
        source: TableError,
    },
}

impl ScanError {
    /// True when the source file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScanError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

// =============================================================================
// Cache Errors
// =============================================================================

/// Errors seeding the geocode cache or appending to its file.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cannot open cache file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read cache: {0}")]
    Read(#[from] std::io::Error),

    #[error("malformed cache line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot write cache file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode cache entry: {0}")]
    Encode(#[source] serde_json::Error),
}

// =============================================================================
// Row Errors
// =============================================================================

/// A row that failed hard. Skip-worthy rows never produce one of these.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("parse {row}: {source} in {record:?}")]
    Parse {
        row: RowId,
        record: Vec<String>,
        #[source]
        source: FieldError,
    },

    #[error("geocode {row} '{address}': {source}")]
    Geocode {
        row: RowId,
        address: String,
        #[source]
        source: GeocodeError,
    },
}

impl RowError {
    pub fn row(&self) -> &RowId {
        match self {
            RowError::Parse { row, .. } | RowError::Geocode { row, .. } => row,
        }
    }
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::Pipeline`] scans.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("row error: {0}")]
    Row(#[from] RowError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("output error: {0}")]
    Output(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Publish Errors
// =============================================================================

/// Errors from the message store client.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("request error: {status} {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("transaction has no serial number to use as custom id")]
    MissingCustomId,

    #[error("line {line} is not a valid transaction: {}", errors.join("; "))]
    InvalidRecord { line: usize, errors: Vec<String> },

    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: Box<PublishError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PublishError {
    pub fn at_line(self, line: usize) -> Self {
        PublishError::Line {
            line,
            source: Box::new(self),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for calendar conversion.
pub type DateResult<T> = Result<T, DateError>;

/// Result type for single-field parsing.
pub type FieldResult<T> = Result<T, FieldError>;

/// Result type for file scanning.
pub type ScanResult<T> = Result<T, ScanError>;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for message store operations.
pub type PublishResult<T> = Result<T, PublishError>;
