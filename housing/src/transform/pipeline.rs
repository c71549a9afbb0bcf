//! Row pipeline: filter, parse, geocode and emit.
//!
//! # Example
//!
//! ```rust,ignore
//! use housing::{GeocodeCache, Geocoder, GoogleGeocoder, Pipeline, ScanOptions};
//!
//! let geocoder = Geocoder::new(GoogleGeocoder::new(api_key), 999_999.0);
//! let pipeline = Pipeline::new(geocoder, GeocodeCache::load("geocode.jsonl")?);
//! let stats = pipeline
//!     .scan_dir(Path::new("2017Q3"), &mut |ts| {
//!         println!("{}", serde_json::to_string(&ts)?);
//!         Ok(())
//!     })
//!     .await?;
//! stats.log();
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use crate::cache::GeocodeCache;
use crate::error::{PipelineError, PipelineResult, RowError, ScanResult};
use crate::filter::{self, RowVerdict, SkipReason};
use crate::geocode::{GeocodeProvider, Geocoder, Sleeper, TokioSleeper};
use crate::models::{RowId, Transaction};
use crate::parser::load_table;
use crate::parser::schema::ADDRESS;
use crate::regions;

use super::row::parse_row;

// =============================================================================
// Options
// =============================================================================

/// What a hard row failure does to the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowErrorPolicy {
    /// Stop the whole scan at the first failure
    #[default]
    Abort,
    /// Log it, count it and carry on
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Rows of a file in flight at once. Output order is kept regardless.
    pub concurrency: usize,
    pub on_row_error: RowErrorPolicy,
    /// Log and skip source files that do not exist instead of failing
    pub skip_missing_files: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            on_row_error: RowErrorPolicy::Abort,
            skip_missing_files: false,
        }
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of a row that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Emitted(Box<Transaction>),
    Skipped(SkipReason),
}

/// Counters for one or more scanned files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub files: usize,
    pub missing_files: usize,
    pub rows: usize,
    pub emitted: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    /// Hard row failures tolerated under [`RowErrorPolicy::Skip`]
    pub failed: usize,
}

impl ScanStats {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    fn record_skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_default() += 1;
    }

    pub fn merge(&mut self, other: ScanStats) {
        self.files += other.files;
        self.missing_files += other.missing_files;
        self.rows += other.rows;
        self.emitted += other.emitted;
        self.failed += other.failed;
        for (reason, count) in other.skipped {
            *self.skipped.entry(reason).or_default() += count;
        }
    }

    pub fn log(&self) {
        info!(
            files = self.files,
            missing_files = self.missing_files,
            rows = self.rows,
            emitted = self.emitted,
            skipped = self.skipped_total(),
            failed = self.failed,
            "scan finished"
        );
        for (reason, count) in &self.skipped {
            info!(reason = reason.label(), count, "rows skipped");
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// One ingest run: a resolver, the cache it fills and scan options.
pub struct Pipeline<P, S = TokioSleeper> {
    geocoder: Geocoder<P, S>,
    cache: GeocodeCache,
    options: ScanOptions,
}

impl<P: GeocodeProvider, S: Sleeper> Pipeline<P, S> {
    pub fn new(geocoder: Geocoder<P, S>, cache: GeocodeCache) -> Self {
        Self {
            geocoder,
            cache,
            options: ScanOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn geocoder(&self) -> &Geocoder<P, S> {
        &self.geocoder
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Run one raw record through filter, field parsing and geocoding.
    ///
    /// Fields are parsed before the address is resolved, so a row that cannot
    /// be parsed never costs a provider call.
    pub async fn process_row(&self, row: &RowId, record: &StringRecord) -> Result<RowOutcome, RowError> {
        if let RowVerdict::Skip(reason) = filter::check(record, row) {
            return Ok(RowOutcome::Skipped(reason));
        }

        let mut ts = parse_row(record).map_err(|source| RowError::Parse {
            row: row.clone(),
            record: record.iter().map(String::from).collect(),
            source,
        })?;

        let address = &record[ADDRESS];
        match self.geocoder.resolve(&self.cache, address).await {
            Ok(coords) => {
                ts.set_coordinates(coords);
                Ok(RowOutcome::Emitted(Box::new(ts)))
            }
            Err(err) if err.is_no_match() => {
                warn!(%row, address, "no geocoding match, dropping row");
                Ok(RowOutcome::Skipped(SkipReason::NoGeocodeMatch))
            }
            Err(source) => Err(RowError::Geocode {
                row: row.clone(),
                address: address.to_string(),
                source,
            }),
        }
    }

    /// Scan one registry file, passing each accepted transaction to `emit` in file order.
    pub async fn scan_file<F>(&self, path: &Path, emit: &mut F) -> PipelineResult<ScanStats>
    where
        F: FnMut(Transaction) -> PipelineResult<()>,
    {
        let table = load_table(path).await?;
        let file = file_label(path);
        let (region, category) = regions::parse_file_name(&file)
            .map(|(r, c)| (r.name, c.name))
            .unwrap_or(("unknown", "unknown"));
        info!(
            file = %file,
            region,
            category,
            encoding = table.encoding,
            rows = table.rows.len(),
            "scanning"
        );

        let mut stats = ScanStats {
            files: 1,
            ..Default::default()
        };

        let rows = table
            .rows
            .iter()
            .enumerate()
            .map(|(i, record)| (RowId::new(file.clone(), i + 1), record));

        let mut outcomes = std::pin::pin!(stream::iter(rows)
            .map(|(row, record)| async move {
                let result = self.process_row(&row, record).await;
                (row, result)
            })
            .buffered(self.options.concurrency.max(1)));

        while let Some((row, result)) = outcomes.next().await {
            stats.rows += 1;
            match result {
                Ok(RowOutcome::Emitted(ts)) => {
                    emit(*ts)?;
                    stats.emitted += 1;
                }
                Ok(RowOutcome::Skipped(reason)) => stats.record_skip(reason),
                Err(err) => match self.options.on_row_error {
                    RowErrorPolicy::Abort => return Err(err.into()),
                    RowErrorPolicy::Skip => {
                        error!(%row, error = %err, "row failed, continuing");
                        stats.failed += 1;
                    }
                },
            }
        }

        Ok(stats)
    }

    /// Scan files in the order given.
    pub async fn scan_files<F>(&self, paths: &[PathBuf], emit: &mut F) -> PipelineResult<ScanStats>
    where
        F: FnMut(Transaction) -> PipelineResult<()>,
    {
        let mut stats = ScanStats::default();
        for path in paths {
            match self.scan_file(path, emit).await {
                Ok(file_stats) => stats.merge(file_stats),
                Err(PipelineError::Scan(err)) if err.is_not_found() && self.options.skip_missing_files => {
                    warn!(path = %path.display(), "source file missing, skipping");
                    stats.missing_files += 1;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(stats)
    }

    /// Scan every expected file of a release directory in region table order.
    pub async fn scan_dir<F>(&self, dir: &Path, emit: &mut F) -> PipelineResult<ScanStats>
    where
        F: FnMut(Transaction) -> PipelineResult<()>,
    {
        let paths: Vec<PathBuf> = regions::source_files(dir).into_iter().map(|f| f.path).collect();
        self.scan_files(&paths, emit).await
    }
}

// =============================================================================
// Address listing
// =============================================================================

/// Addresses of the rows of a file that pass the row filter, in file order.
pub async fn addresses_in_file(path: &Path) -> ScanResult<Vec<String>> {
    let table = load_table(path).await?;
    let file = file_label(path);

    Ok(table
        .rows
        .iter()
        .enumerate()
        .filter(|(i, record)| filter::check(record, &RowId::new(file.clone(), i + 1)) == RowVerdict::Keep)
        .map(|(_, record)| record[ADDRESS].to_string())
        .collect())
}

/// Addresses across several files. Missing files are skipped when `skip_missing` is set.
pub async fn addresses_in_files(paths: &[PathBuf], skip_missing: bool) -> ScanResult<Vec<String>> {
    let mut addresses = Vec::new();
    for path in paths {
        match addresses_in_file(path).await {
            Ok(found) => addresses.extend(found),
            Err(err) if skip_missing && err.is_not_found() => {
                warn!(path = %path.display(), "source file missing, skipping");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(addresses)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
