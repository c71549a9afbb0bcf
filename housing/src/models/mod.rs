//! Domain models for the housing ingest pipeline.
//!
//! - [`Transaction`] - one normalized, geocoded real-price registration record
//! - [`Coordinates`] - a resolved latitude/longitude pair
//! - [`RowId`] - where a raw record came from (file name + row index)

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Coordinates
// =============================================================================

/// A resolved position in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

// =============================================================================
// Row Identity
// =============================================================================

/// Source of a raw record: file name and row index within the file.
///
/// The index counts the header as row 0, so the first data row is 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowId {
    pub file: String,
    pub index: usize,
}

impl RowId {
    pub fn new(file: impl Into<String>, index: usize) -> Self {
        Self {
            file: file.into(),
            index,
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.index)
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A normalized transaction record.
///
/// Serialized with the registry's own column names as keys. Zero and empty values
/// are omitted, as is an absent completion date. Dates are Unix seconds at UTC
/// midnight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transaction {
    #[serde(rename = "鄉鎮市區", skip_serializing_if = "String::is_empty")]
    pub district: String,

    #[serde(rename = "交易標的", skip_serializing_if = "String::is_empty")]
    pub subject: String,

    #[serde(rename = "土地區段位置或建物區門牌", skip_serializing_if = "String::is_empty")]
    pub address: String,

    #[serde(rename = "土地移轉總面積平方公尺", skip_serializing_if = "is_zero_f64")]
    pub land_area_m2: f64,

    #[serde(rename = "都市土地使用分區", skip_serializing_if = "String::is_empty")]
    pub urban_zoning: String,

    #[serde(rename = "非都市土地使用分區", skip_serializing_if = "String::is_empty")]
    pub non_urban_zoning: String,

    #[serde(rename = "非都市土地使用編定", skip_serializing_if = "String::is_empty")]
    pub non_urban_designation: String,

    #[serde(rename = "交易年月日", skip_serializing_if = "is_zero_i64")]
    pub transaction_date: i64,

    #[serde(rename = "交易筆棟數", skip_serializing_if = "String::is_empty")]
    pub parcel_counts: String,

    #[serde(rename = "移轉層次", skip_serializing_if = "String::is_empty")]
    pub transfer_floor: String,

    #[serde(rename = "總樓層數", skip_serializing_if = "String::is_empty")]
    pub total_floors: String,

    #[serde(rename = "建物型態", skip_serializing_if = "String::is_empty")]
    pub building_type: String,

    #[serde(rename = "主要用途", skip_serializing_if = "String::is_empty")]
    pub main_use: String,

    #[serde(rename = "主要建材", skip_serializing_if = "String::is_empty")]
    pub main_material: String,

    #[serde(rename = "建築完成年月", skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<i64>,

    #[serde(rename = "建物移轉總面積平方公尺", skip_serializing_if = "is_zero_f64")]
    pub building_area_m2: f64,

    #[serde(rename = "建物現況格局_房", skip_serializing_if = "is_zero_i64")]
    pub rooms: i64,

    #[serde(rename = "建物現況格局_廳", skip_serializing_if = "is_zero_i64")]
    pub halls: i64,

    #[serde(rename = "建物現況格局_衛", skip_serializing_if = "is_zero_i64")]
    pub bathrooms: i64,

    #[serde(rename = "建物現況格局_隔間", skip_serializing_if = "String::is_empty")]
    pub partitioned: String,

    #[serde(rename = "有無管理組織", skip_serializing_if = "String::is_empty")]
    pub management_org: String,

    #[serde(rename = "總價元", skip_serializing_if = "is_zero_i64")]
    pub total_price: i64,

    #[serde(rename = "單價每平方公尺", skip_serializing_if = "is_zero_i64")]
    pub unit_price_per_m2: i64,

    #[serde(rename = "車位類別", skip_serializing_if = "String::is_empty")]
    pub parking_type: String,

    #[serde(rename = "車位移轉總面積平方公尺", skip_serializing_if = "is_zero_f64")]
    pub parking_area_m2: f64,

    #[serde(rename = "車位總價元", skip_serializing_if = "is_zero_i64")]
    pub parking_price: i64,

    #[serde(rename = "備註", skip_serializing_if = "String::is_empty")]
    pub remarks: String,

    #[serde(rename = "編號", skip_serializing_if = "String::is_empty")]
    pub serial_number: String,

    #[serde(rename = "Lat", skip_serializing_if = "is_zero_f64")]
    pub lat: f64,

    #[serde(rename = "Lng", skip_serializing_if = "is_zero_f64")]
    pub lng: f64,
}

impl Transaction {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }

    pub fn set_coordinates(&mut self, coords: Coordinates) {
        self.lat = coords.lat;
        self.lng = coords.lng;
    }
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zero_and_empty_fields_omitted() {
        let ts = Transaction {
            district: "鳳山區".into(),
            address: "高雄市鳳山區青年路二段181~210號".into(),
            transaction_date: 1_490_918_400,
            rooms: 4,
            lat: 22.62,
            lng: 120.36,
            ..Default::default()
        };

        let value = serde_json::to_value(&ts).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 6);
        assert_eq!(value["鄉鎮市區"], "鳳山區");
        assert_eq!(value["建物現況格局_房"], 4);
        assert!(obj.get("建築完成年月").is_none());
        assert!(obj.get("車位總價元").is_none());
    }

    #[test]
    fn test_completion_date_present_when_set() {
        let ts = Transaction {
            completion_date: Some(0),
            ..Default::default()
        };
        let value = serde_json::to_value(&ts).unwrap();
        assert_eq!(value, json!({ "建築完成年月": 0 }));
    }

    #[test]
    fn test_deserialize_with_missing_fields() {
        let ts: Transaction =
            serde_json::from_str(r#"{"編號":"RPX","Lat":25.0,"Lng":121.5,"總價元":100}"#).unwrap();
        assert_eq!(ts.serial_number, "RPX");
        assert_eq!(ts.coordinates(), Coordinates::new(25.0, 121.5));
        assert_eq!(ts.total_price, 100);
        assert_eq!(ts.completion_date, None);
    }

    #[test]
    fn test_row_id_display() {
        assert_eq!(RowId::new("E_lvr_land_A.CSV", 499).to_string(), "E_lvr_land_A.CSV:499");
    }
}
