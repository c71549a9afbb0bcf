//! Row filter: decides which raw records are worth parsing.
//!
//! Runs before any field is converted. Exclusion is never an error; only an
//! empty address or a malformed row is worth a diagnostic.

use csv::StringRecord;
use tracing::warn;

use crate::models::RowId;
use crate::parser::schema::{ADDRESS, COLUMN_COUNT, SERIAL_NUMBER, SUBJECT, UNIT_PRICE};

/// Subject of a land-only transaction. No street address to geocode.
pub const LAND_ONLY: &str = "土地";

/// Subject of a parking-space-only transaction. No street address to geocode.
pub const PARKING_ONLY: &str = "車位";

/// Source records known to carry an impossible completion date.
pub const DENYLIST: [&str; 3] = [
    // 2017Q3 E_lvr_land_A.CSV:499, completion date 0800230 (1991-02-30)
    "RPPQMLPJNHMFFGE68CA",
    // 2017Q3 B_lvr_land_A.CSV:5579, completion date 0790229 (1990-02-29)
    "RPUNMLQKOHMFFAL66CA",
    // 2017Q3 B_lvr_land_A.CSV:6618, completion date 0740230 (1985-02-30)
    "RPSNMLLJPHMFFIB38CA",
];

/// Why a row did not produce a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    Malformed,
    EmptyAddress,
    OutOfScopeSubject,
    MissingUnitPrice,
    Denylisted,
    NoGeocodeMatch,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::Malformed => "malformed",
            SkipReason::EmptyAddress => "empty_address",
            SkipReason::OutOfScopeSubject => "out_of_scope_subject",
            SkipReason::MissingUnitPrice => "missing_unit_price",
            SkipReason::Denylisted => "denylisted",
            SkipReason::NoGeocodeMatch => "no_geocode_match",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowVerdict {
    Keep,
    Skip(SkipReason),
}

/// Apply the exclusion rules in order.
pub fn check(record: &StringRecord, row: &RowId) -> RowVerdict {
    if record.len() != COLUMN_COUNT {
        warn!(%row, fields = record.len(), "malformed row, expected {} fields", COLUMN_COUNT);
        return RowVerdict::Skip(SkipReason::Malformed);
    }

    if record[ADDRESS].is_empty() {
        warn!(%row, record = ?record, "empty address");
        return RowVerdict::Skip(SkipReason::EmptyAddress);
    }

    let subject = &record[SUBJECT];
    if subject == LAND_ONLY || subject == PARKING_ONLY {
        return RowVerdict::Skip(SkipReason::OutOfScopeSubject);
    }

    if record[UNIT_PRICE].is_empty() {
        return RowVerdict::Skip(SkipReason::MissingUnitPrice);
    }

    if DENYLIST.contains(&&record[SERIAL_NUMBER]) {
        return RowVerdict::Skip(SkipReason::Denylisted);
    }

    RowVerdict::Keep
}
