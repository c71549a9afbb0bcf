//! Region and trade-category code tables.
//!
//! Registry exports are split into one file per (region, category) pair named
//! `{region}_lvr_land_{category}.CSV`. The tables below fix the scan order.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

/// A county or city and its one-letter file code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub code: &'static str,
    pub name: &'static str,
}

/// A trade category and its one-letter file code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub code: &'static str,
    pub name: &'static str,
}

pub static REGIONS: [Region; 22] = [
    Region { code: "C", name: "基隆市" },
    Region { code: "A", name: "臺北市" },
    Region { code: "F", name: "新北市" },
    Region { code: "H", name: "桃園縣" },
    Region { code: "O", name: "新竹市" },
    Region { code: "J", name: "新竹縣" },
    Region { code: "K", name: "苗栗縣" },
    Region { code: "B", name: "臺中市" },
    Region { code: "M", name: "南投縣" },
    Region { code: "N", name: "彰化縣" },
    Region { code: "P", name: "雲林縣" },
    Region { code: "I", name: "嘉義市" },
    Region { code: "Q", name: "嘉義縣" },
    Region { code: "D", name: "臺南市" },
    Region { code: "E", name: "高雄市" },
    Region { code: "T", name: "屏東縣" },
    Region { code: "G", name: "宜蘭縣" },
    Region { code: "U", name: "花蓮縣" },
    Region { code: "V", name: "臺東縣" },
    Region { code: "X", name: "澎湖縣" },
    Region { code: "W", name: "金門縣" },
    Region { code: "Z", name: "連江縣" },
];

/// Categories that are scanned.
///
/// B (pre-sale) is left out because its rows carry land-lot numbers instead of
/// geocodable addresses; C (rentals) because rentals are not purchases.
pub static CATEGORIES: [Category; 1] = [Category { code: "A", name: "不動產買賣" }];

static FILE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([a-z])_lvr_land_([a-z])\.csv$").expect("file name pattern is valid")
});

/// One expected source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub region: Region,
    pub category: Category,
    pub path: PathBuf,
}

pub fn file_name(region: &Region, category: &Category) -> String {
    format!("{}_lvr_land_{}.CSV", region.code, category.code)
}

/// Every expected file under `dir`, in scan order.
pub fn source_files(dir: &Path) -> Vec<SourceFile> {
    REGIONS
        .iter()
        .flat_map(|region| {
            CATEGORIES.iter().map(move |category| SourceFile {
                region: *region,
                category: *category,
                path: dir.join(file_name(region, category)),
            })
        })
        .collect()
}

pub fn region_by_code(code: &str) -> Option<&'static Region> {
    REGIONS.iter().find(|r| r.code.eq_ignore_ascii_case(code))
}

pub fn category_by_code(code: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|c| c.code.eq_ignore_ascii_case(code))
}

/// Recognize a registry file name such as `E_lvr_land_A.CSV`.
pub fn parse_file_name(name: &str) -> Option<(&'static Region, &'static Category)> {
    let caps = FILE_NAME.captures(name)?;
    let region = region_by_code(caps.get(1)?.as_str())?;
    let category = category_by_code(caps.get(2)?.as_str())?;
    Some((region, category))
}
