//! Shared fixtures for unit tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use csv::StringRecord;
use encoding_rs::BIG5;

use crate::geocode::{GeocodeError, GeocodeProvider, Sleeper};
use crate::models::Coordinates;
use crate::parser::schema::COLUMNS;

/// Coordinates returned once a [`ScriptedProvider`] runs out of script.
pub const DEFAULT_COORDS: Coordinates = Coordinates { lat: 22.6203, lng: 120.3560 };

/// A complete residential sale row, as found in a Kaohsiung export.
pub fn sample_fields() -> Vec<String> {
    [
        "鳳山區",
        "房地(土地+建物)",
        "高雄市鳳山區青年路二段181~210號",
        "19.29",
        "住",
        "",
        "",
        "1060331",
        "土地0建物1車位0",
        "十六層",
        "十八層",
        "住宅大樓(11層含以上有電梯)",
        "住家用",
        "鋼筋混凝土造",
        "0800228",
        "162.05",
        "4",
        "2",
        "2",
        "有",
        "有",
        "4860000",
        "29991",
        "",
        "0.0",
        "0",
        "",
        "RPPQMLPJNHMFFGE99CA",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn sample_record() -> StringRecord {
    StringRecord::from(sample_fields())
}

/// A sample row with some columns replaced.
pub fn record_with(changes: &[(usize, &str)]) -> Vec<String> {
    let mut fields = sample_fields();
    for (index, value) in changes {
        fields[*index] = value.to_string();
    }
    fields
}

/// Write a Big5 registry file with the standard header and CRLF line endings.
pub fn write_table(dir: &Path, name: &str, rows: &[Vec<String>]) -> PathBuf {
    let mut content = COLUMNS.join(",");
    content.push_str("\r\n");
    for row in rows {
        content.push_str(&row.join(","));
        content.push_str("\r\n");
    }
    let (bytes, _, had_errors) = BIG5.encode(&content);
    assert!(!had_errors, "fixture not representable in Big5");

    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Provider answering from a script, then with [`DEFAULT_COORDS`]. Counts calls.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    calls: AtomicUsize,
    script: Mutex<VecDeque<Result<Coordinates, GeocodeError>>>,
}

impl ScriptedProvider {
    pub fn then_ok(self, coords: Coordinates) -> Self {
        self.script.lock().unwrap().push_back(Ok(coords));
        self
    }

    pub fn then_err(self, err: GeocodeError) -> Self {
        self.script.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GeocodeProvider for ScriptedProvider {
    async fn geocode(&self, _address: &str) -> Result<Coordinates, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or(Ok(DEFAULT_COORDS))
    }
}

/// Sleeper that records requested delays and returns at once.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}
