//! Registry file decoding and tokenization.
//!
//! Files are published in Big5; newer releases may be UTF-8. The encoding is
//! detected from the bytes, the content decoded, tokenized as CSV and the
//! header row checked against the fixed [`schema::COLUMNS`].

pub mod fields;
pub mod roc_date;
pub mod schema;

use std::borrow::Cow;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use encoding_rs::{Encoding, BIG5, UTF_8};
use tracing::{debug, warn};

use crate::error::{ScanError, ScanResult, TableError};

pub use fields::{parse_date, parse_float, parse_int, parse_optional_date, FieldParser};
pub use roc_date::{parse_roc_date, roc_to_unix, ERA_OFFSET};
pub use schema::{check_header, COLUMNS, COLUMN_COUNT};

/// A decoded registry file with its header checked and removed.
#[derive(Debug, Clone)]
pub struct ParsedTable {
    /// Name of the encoding the bytes were decoded from
    pub encoding: &'static str,
    /// Data rows in file order
    pub rows: Vec<StringRecord>,
}

/// Detect the encoding of raw file bytes.
///
/// A BOM wins; otherwise valid UTF-8 is taken as UTF-8 and anything else as Big5.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }
    if std::str::from_utf8(bytes).is_ok() {
        UTF_8
    } else {
        BIG5
    }
}

/// Decode bytes with the given encoding, dropping a BOM.
///
/// Malformed sequences become U+FFFD and are reported once.
pub fn decode_content<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> Cow<'a, str> {
    let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
    if had_errors {
        warn!(encoding = encoding.name(), "malformed byte sequences replaced while decoding");
    }
    text
}

/// Tokenize decoded content and check its header.
///
/// Rows keep whatever field count they have; the row filter rejects the odd ones.
pub fn parse_rows(content: &str) -> Result<Vec<StringRecord>, TableError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut records = reader.records();

    let header = records.next().ok_or(TableError::Empty)??;
    check_header(&header)?;

    records
        .map(|record| record.map_err(TableError::from))
        .collect()
}

/// Detect, decode and tokenize a whole file held in memory.
pub fn decode_table(bytes: &[u8]) -> Result<ParsedTable, TableError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, encoding);
    let rows = parse_rows(&content)?;

    debug!(encoding = encoding.name(), rows = rows.len(), "decoded registry table");
    Ok(ParsedTable {
        encoding: encoding.name(),
        rows,
    })
}

/// Read and decode a registry file.
pub async fn load_table(path: &Path) -> ScanResult<ParsedTable> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    decode_table(&bytes).map_err(|source| ScanError::Table {
        path: path.to_path_buf(),
        source,
    })
}
