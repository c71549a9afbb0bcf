//! Geocode cache - address to coordinate lookups for one pipeline run
//!
//! Seeded from a newline-delimited JSON file of earlier resolutions, updated in
//! memory as addresses resolve. The file is never rewritten; entries resolved by
//! the run can be appended to it on request.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::error::{CacheError, CacheResult};
use crate::models::Coordinates;

/// A cached resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheEntry {
    pub lat: f64,
    pub lng: f64,
    /// Uncertainty radius in meters. 0 means resolved by this run.
    pub precision: f64,
}

impl CacheEntry {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

/// One line of the cache file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheLine {
    #[serde(rename = "Addr", alias = "addr", alias = "address", alias = "Address")]
    addr: String,
    #[serde(rename = "Lat", alias = "lat")]
    lat: f64,
    #[serde(rename = "Lng", alias = "lng")]
    lng: f64,
    #[serde(rename = "Precision", alias = "precision", default)]
    precision: f64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Addresses resolved during this run, in first-resolution order
    resolved: Vec<String>,
    resolved_set: HashSet<String>,
}

/// Address to coordinate cache owned by a pipeline run.
///
/// Safe to share between concurrently processed rows; the lock is never held
/// across a suspension point.
#[derive(Debug, Default)]
pub struct GeocodeCache {
    state: Mutex<CacheState>,
}

impl GeocodeCache {
    /// An empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a cache file. A malformed line fails the whole load.
    pub fn load(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| CacheError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let cache = Self::from_reader(BufReader::new(file))?;
        info!(path = %path.display(), entries = cache.len(), "loaded geocode cache");
        Ok(cache)
    }

    /// Load cache lines from any buffered reader. Blank lines are ignored.
    pub fn from_reader<R: BufRead>(reader: R) -> CacheResult<Self> {
        let cache = Self::new();
        {
            let mut state = cache.lock();
            for (idx, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let parsed: CacheLine = serde_json::from_str(&line)
                    .map_err(|source| CacheError::Malformed { line: idx + 1, source })?;
                state.entries.insert(
                    parsed.addr,
                    CacheEntry {
                        lat: parsed.lat,
                        lng: parsed.lng,
                        precision: parsed.precision,
                    },
                );
            }
        }
        Ok(cache)
    }

    /// Look up an address exactly as written
    pub fn get(&self, address: &str) -> Option<CacheEntry> {
        self.lock().entries.get(address).copied()
    }

    /// Cached coordinates whose precision is strictly better than `threshold_meters`.
    pub fn lookup_within(&self, address: &str, threshold_meters: f64) -> Option<Coordinates> {
        self.get(address)
            .filter(|entry| entry.precision < threshold_meters)
            .map(|entry| entry.coordinates())
    }

    /// Insert or replace an entry verbatim.
    pub fn insert(&self, address: impl Into<String>, entry: CacheEntry) {
        self.lock().entries.insert(address.into(), entry);
    }

    /// Store a resolution made by this run. Overwrites any earlier entry.
    pub fn record_resolution(&self, address: &str, coords: Coordinates) {
        let mut state = self.lock();
        state.entries.insert(
            address.to_string(),
            CacheEntry {
                lat: coords.lat,
                lng: coords.lng,
                precision: 0.0,
            },
        );
        if state.resolved_set.insert(address.to_string()) {
            state.resolved.push(address.to_string());
        }
        debug!(address, lat = coords.lat, lng = coords.lng, "cached resolution");
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of addresses resolved during this run
    pub fn resolved_count(&self) -> usize {
        self.lock().resolved.len()
    }

    /// Append this run's resolutions to a cache file, creating it if needed.
    ///
    /// Returns the number of lines written.
    pub fn append_resolved(&self, path: impl AsRef<Path>) -> CacheResult<usize> {
        let path = path.as_ref();
        let lines = {
            let state = self.lock();
            state
                .resolved
                .iter()
                .filter_map(|addr| state.entries.get(addr).map(|e| (addr, *e)))
                .map(|(addr, entry)| {
                    serde_json::to_string(&CacheLine {
                        addr: addr.clone(),
                        lat: entry.lat,
                        lng: entry.lng,
                        precision: entry.precision,
                    })
                    .map_err(CacheError::Encode)
                })
                .collect::<CacheResult<Vec<_>>>()?
        };

        if lines.is_empty() {
            return Ok(0);
        }

        let write_err = |source| CacheError::Write {
            path: path.to_path_buf(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(write_err)?;
        let mut out = BufWriter::new(file);
        for line in &lines {
            writeln!(out, "{}", line).map_err(write_err)?;
        }
        out.flush().map_err(write_err)?;

        info!(path = %path.display(), entries = lines.len(), "appended resolutions to geocode cache");
        Ok(lines.len())
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
