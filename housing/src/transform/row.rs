//! Raw record to [`Transaction`] conversion.

use csv::StringRecord;

use crate::error::FieldResult;
use crate::models::Transaction;
use crate::parser::fields::FieldParser;
use crate::parser::schema::COLUMNS;

/// Convert the 28 columns of a record, in column order.
///
/// Coordinates are left at zero; the pipeline fills them in after geocoding.
/// The caller guarantees the field count (see [`crate::filter::check`]).
pub fn parse_row(record: &StringRecord) -> FieldResult<Transaction> {
    let text = |i: usize| record.get(i).unwrap_or_default().to_string();
    let raw = |i: usize| record.get(i).unwrap_or_default();
    let mut p = FieldParser::new();

    let ts = Transaction {
        district: text(0),
        subject: text(1),
        address: text(2),
        land_area_m2: p.float(raw(3), COLUMNS[3]),
        urban_zoning: text(4),
        non_urban_zoning: text(5),
        non_urban_designation: text(6),
        transaction_date: p.date(raw(7), COLUMNS[7]),
        parcel_counts: text(8),
        transfer_floor: text(9),
        total_floors: text(10),
        building_type: text(11),
        main_use: text(12),
        main_material: text(13),
        completion_date: p.optional_date(raw(14), COLUMNS[14]),
        building_area_m2: p.float(raw(15), COLUMNS[15]),
        rooms: p.int(raw(16), COLUMNS[16]),
        halls: p.int(raw(17), COLUMNS[17]),
        bathrooms: p.int(raw(18), COLUMNS[18]),
        partitioned: text(19),
        management_org: text(20),
        total_price: p.int(raw(21), COLUMNS[21]),
        unit_price_per_m2: p.int(raw(22), COLUMNS[22]),
        parking_type: text(23),
        parking_area_m2: p.float(raw(24), COLUMNS[24]),
        parking_price: p.int(raw(25), COLUMNS[25]),
        remarks: text(26),
        serial_number: text(27),
        lat: 0.0,
        lng: 0.0,
    };

    p.finish()?;
    Ok(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldErrorKind;
    use crate::test_support::{record_with, sample_record};

    #[test]
    fn test_sample_row() {
        let ts = parse_row(&sample_record()).unwrap();
        assert_eq!(ts.district, "鳳山區");
        assert_eq!(ts.address, "高雄市鳳山區青年路二段181~210號");
        assert_eq!(ts.land_area_m2, 19.29);
        assert_eq!(ts.transaction_date, 1_490_918_400);
        assert_eq!(ts.completion_date, Some(667_699_200));
        assert_eq!(ts.building_area_m2, 162.05);
        assert_eq!((ts.rooms, ts.halls, ts.bathrooms), (4, 2, 2));
        assert_eq!(ts.total_price, 4_860_000);
        assert_eq!(ts.unit_price_per_m2, 29_991);
        assert_eq!(ts.parking_area_m2, 0.0);
        assert_eq!(ts.parking_price, 0);
        assert_eq!(ts.serial_number, "RPPQMLPJNHMFFGE99CA");
        assert_eq!(ts.coordinates().lat, 0.0);
    }

    #[test]
    fn test_empty_completion_date_absent() {
        let record = StringRecord::from(record_with(&[(14, "")]));
        let ts = parse_row(&record).unwrap();
        assert_eq!(ts.completion_date, None);
    }

    #[test]
    fn test_first_bad_field_reported() {
        let record = StringRecord::from(record_with(&[(16, "四"), (21, "很貴")]));
        let err = parse_row(&record).unwrap_err();
        assert_eq!(err.field, "建物現況格局-房");
        assert_eq!(err.value, "四");
        assert!(matches!(err.kind, FieldErrorKind::Integer(_)));
    }

    #[test]
    fn test_invalid_completion_date() {
        let record = StringRecord::from(record_with(&[(14, "0800230")]));
        let err = parse_row(&record).unwrap_err();
        assert_eq!(err.field, "建築完成年月");
        assert!(matches!(err.kind, FieldErrorKind::Date(_)));
    }

    #[test]
    fn test_empty_float_is_an_error() {
        let record = StringRecord::from(record_with(&[(3, "")]));
        assert_eq!(parse_row(&record).unwrap_err().field, "土地移轉總面積平方公尺");
    }

    #[test]
    fn test_non_finite_float_is_an_error() {
        for value in ["NaN", "inf", "-infinity"] {
            let record = StringRecord::from(record_with(&[(3, value)]));
            let err = parse_row(&record).unwrap_err();
            assert_eq!(err.field, "土地移轉總面積平方公尺");
            assert_eq!(err.kind, FieldErrorKind::NonFinite);
        }
    }

    #[test]
    fn test_negative_counts_pass_schema() {
        let record = StringRecord::from(record_with(&[(16, "-1"), (21, "-5")]));
        let mut ts = parse_row(&record).unwrap();
        assert_eq!(ts.rooms, -1);
        ts.lat = 22.6;
        ts.lng = 120.3;
        let json = serde_json::to_value(&ts).unwrap();
        assert!(crate::validation::is_valid_transaction(&json));
    }
}
