//! The fixed 28-column schema of a real-price registration file.

use csv::StringRecord;

use crate::error::HeaderError;

/// Column names, in file order.
pub const COLUMNS: [&str; 28] = [
    "鄉鎮市區",
    "交易標的",
    "土地區段位置或建物區門牌",
    "土地移轉總面積平方公尺",
    "都市土地使用分區",
    "非都市土地使用分區",
    "非都市土地使用編定",
    "交易年月日",
    "交易筆棟數",
    "移轉層次",
    "總樓層數",
    "建物型態",
    "主要用途",
    "主要建材",
    "建築完成年月",
    "建物移轉總面積平方公尺",
    "建物現況格局-房",
    "建物現況格局-廳",
    "建物現況格局-衛",
    "建物現況格局-隔間",
    "有無管理組織",
    "總價元",
    "單價每平方公尺",
    "車位類別",
    "車位移轉總面積平方公尺",
    "車位總價元",
    "備註",
    "編號",
];

pub const COLUMN_COUNT: usize = COLUMNS.len();

// Indices the filter and pipeline look at directly.
pub const SUBJECT: usize = 1;
pub const ADDRESS: usize = 2;
pub const UNIT_PRICE: usize = 22;
pub const SERIAL_NUMBER: usize = 27;

/// Check that a header row matches [`COLUMNS`] exactly.
pub fn check_header(header: &StringRecord) -> Result<(), HeaderError> {
    if header.len() != COLUMN_COUNT {
        return Err(HeaderError::ColumnCount {
            found: header.len(),
            expected: COLUMN_COUNT,
        });
    }

    for (index, (found, expected)) in header.iter().zip(COLUMNS).enumerate() {
        if found != expected {
            return Err(HeaderError::ColumnName {
                index,
                found: found.to_string(),
                expected,
            });
        }
    }

    Ok(())
}
