//! # Housing - real-price registration ingest
//!
//! Reads the quarterly real-price registration exports (one Big5 CSV per region
//! and trade category), converts each purchase record into a typed
//! [`Transaction`], resolves its street address to coordinates and emits it as
//! one JSON line.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  CSV File   │───▶│   Parser    │───▶│   Filter    │───▶│   Fields    │───▶│  Geocoder   │───▶ JSON lines
//! │   (Big5)    │    │ (enc + hdr) │    │ (rules+deny)│    │ (ROC dates) │    │ (cache+API) │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use housing::{GeocodeCache, Geocoder, GoogleGeocoder, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let geocoder = Geocoder::new(GoogleGeocoder::new("api-key"), 999_999.0);
//!     let pipeline = Pipeline::new(geocoder, GeocodeCache::load("geocode.jsonl")?);
//!     pipeline
//!         .scan_dir("2017Q3".as_ref(), &mut |ts| {
//!             println!("{}", serde_json::to_string(&ts)?);
//!             Ok(())
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (Transaction, Coordinates, RowId)
//! - [`parser`] - Encoding detection, CSV tokenization, ROC dates, field parsing
//! - [`regions`] - Region and category code tables
//! - [`filter`] - Row exclusion rules and denylist
//! - [`cache`] - Geocode cache
//! - [`geocode`] - Resolver with retry, Google provider
//! - [`transform`] - Row conversion and pipeline
//! - [`validation`] - Transaction schema validation
//! - [`publish`] - Message store client

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod parser;
pub mod regions;

// Filtering
pub mod filter;

// Geocoding
pub mod cache;
pub mod geocode;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Downstream
pub mod publish;

#[cfg(test)]
pub(crate) mod test_support;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CacheError,
    DateError,
    FieldError,
    FieldErrorKind,
    HeaderError,
    PipelineError,
    PublishError,
    RowError,
    ScanError,
    TableError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Coordinates, RowId, Transaction};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_table,
    detect_encoding,
    load_table,
    parse_roc_date,
    roc_to_unix,
    FieldParser,
    ParsedTable,
    COLUMNS,
};

pub use regions::{source_files, Category, Region, SourceFile, CATEGORIES, REGIONS};

// =============================================================================
// Re-exports - Filter
// =============================================================================

pub use filter::{RowVerdict, SkipReason, DENYLIST};

// =============================================================================
// Re-exports - Geocoding
// =============================================================================

pub use cache::{CacheEntry, GeocodeCache};

pub use geocode::{
    GeocodeError,
    GeocodeProvider,
    Geocoder,
    GoogleGeocoder,
    RetryPolicy,
    Sleeper,
    TokioSleeper,
    DEFAULT_PRECISION_METERS,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::{
    addresses_in_file,
    addresses_in_files,
    parse_row,
    Pipeline,
    RowErrorPolicy,
    RowOutcome,
    ScanOptions,
    ScanStats,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{is_valid, is_valid_transaction, validate, validate_lines, validate_transaction, ValidationReport};

// =============================================================================
// Re-exports - Publishing
// =============================================================================

pub use publish::{MessageStoreClient, Msg, PublishSummary};
