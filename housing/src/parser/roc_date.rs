//! ROC (Minguo) calendar dates.
//!
//! Registry dates count years from 1912 (ROC year 1 = 1912 CE) and are written
//! as a plain digit string, `YYYMMDD` or `YYMMDD`. Older construction dates may
//! omit the day (`0YYMM`) or both day and month (`0YY`), in which case the
//! missing parts are taken as 1.

use chrono::{NaiveDate, NaiveTime};

use crate::error::{DateError, DateResult};

/// Offset between ROC and CE years.
pub const ERA_OFFSET: i32 = 1911;

/// Parse a ROC date string into a calendar date.
///
/// Rejects impossible dates such as `0800230` (30 Feb 1991) instead of
/// rolling them over into the next month.
pub fn parse_roc_date(input: &str) -> DateResult<NaiveDate> {
    if !input.is_ascii() {
        return Err(DateError::Format(input.to_string()));
    }

    let len = input.len();
    let leading_zero = input.starts_with('0');
    let (year, month, day) = match len {
        3 if leading_zero => (input, None, None),
        5 if leading_zero => (&input[..3], Some(&input[3..]), None),
        6 | 7 => (&input[..len - 4], Some(&input[len - 4..len - 2]), Some(&input[len - 2..])),
        _ => return Err(DateError::Format(input.to_string())),
    };

    let day = component(input, day, "day")?;
    let month = component(input, month, "month")?;
    let year = component(input, Some(year), "year")? + ERA_OFFSET;

    let invalid = || DateError::Invalid {
        input: input.to_string(),
        year,
        month,
        day,
    };

    // Only four-digit CE years are representable in the source format.
    if !(0..=9999).contains(&year) {
        return Err(invalid());
    }
    let month_u = u32::try_from(month).map_err(|_| invalid())?;
    let day_u = u32::try_from(day).map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(year, month_u, day_u).ok_or_else(invalid)
}

/// Parse a ROC date string into Unix seconds at UTC midnight.
pub fn roc_to_unix(input: &str) -> DateResult<i64> {
    let date = parse_roc_date(input)?;
    Ok(date.and_time(NaiveTime::MIN).and_utc().timestamp())
}

/// A missing component counts as 1.
fn component(input: &str, part: Option<&str>, name: &'static str) -> DateResult<i32> {
    match part {
        None => Ok(1),
        Some(digits) => digits.parse().map_err(|_| DateError::Component {
            input: input.to_string(),
            part: name,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_seven_digit_date() {
        assert_eq!(parse_roc_date("1060331").unwrap(), ymd(2017, 3, 31));
    }

    #[test]
    fn test_six_digit_date() {
        assert_eq!(parse_roc_date("991231").unwrap(), ymd(2010, 12, 31));
        assert_eq!(parse_roc_date("800105").unwrap(), ymd(1991, 1, 5));
    }

    #[test]
    fn test_year_and_month_only() {
        assert_eq!(parse_roc_date("06907").unwrap(), ymd(1980, 7, 1));
    }

    #[test]
    fn test_year_only() {
        assert_eq!(parse_roc_date("065").unwrap(), ymd(1976, 1, 1));
    }

    #[test]
    fn test_short_forms_need_leading_zero() {
        assert!(matches!(parse_roc_date("106"), Err(DateError::Format(_))));
        assert!(matches!(parse_roc_date("10603"), Err(DateError::Format(_))));
    }

    #[test]
    fn test_unknown_lengths_rejected() {
        for input in ["", "1", "12", "1234", "12345678"] {
            assert!(
                matches!(parse_roc_date(input), Err(DateError::Format(_))),
                "{input:?} should be a format error"
            );
        }
    }

    #[test]
    fn test_non_digit_component_rejected() {
        assert_eq!(
            parse_roc_date("106a331"),
            Err(DateError::Component {
                input: "106a331".into(),
                part: "month",
            })
        );
        assert!(matches!(
            parse_roc_date("1O60331"),
            Err(DateError::Component { part: "year", .. })
        ));
    }

    #[test]
    fn test_non_ascii_rejected() {
        assert!(matches!(parse_roc_date("一〇六"), Err(DateError::Format(_))));
    }

    #[test]
    fn test_impossible_dates_rejected() {
        // 1991-02-30, 1990-02-29, 1985-02-30
        for input in ["0800230", "0790229", "0740230"] {
            assert!(
                matches!(parse_roc_date(input), Err(DateError::Invalid { .. })),
                "{input} should not roll over"
            );
        }
        assert!(matches!(parse_roc_date("1061301"), Err(DateError::Invalid { .. })));
        assert!(matches!(parse_roc_date("1060400"), Err(DateError::Invalid { .. })));
        assert!(matches!(parse_roc_date("1060431"), Err(DateError::Invalid { .. })));
    }

    #[test]
    fn test_leap_years() {
        // 2016 and 2000 are leap years, 2100 is not.
        assert_eq!(parse_roc_date("1050229").unwrap(), ymd(2016, 2, 29));
        assert_eq!(parse_roc_date("0890229").unwrap(), ymd(2000, 2, 29));
        assert!(parse_roc_date("1890229").is_err());
    }

    #[test]
    fn test_invalid_error_carries_ce_date() {
        let err = parse_roc_date("0800230").unwrap_err();
        assert_eq!(
            err,
            DateError::Invalid {
                input: "0800230".into(),
                year: 1991,
                month: 2,
                day: 30,
            }
        );
    }

    #[test]
    fn test_unix_seconds_at_midnight() {
        assert_eq!(roc_to_unix("0590101").unwrap(), 0);
        assert_eq!(roc_to_unix("1060331").unwrap(), 1_490_918_400);
        assert_eq!(roc_to_unix("0590102").unwrap(), 86_400);
    }

    #[test]
    fn test_round_trip_every_day_of_a_leap_year() {
        let mut date = ymd(2016, 1, 1);
        while date.year() == 2016 {
            let roc = format!(
                "{}{:02}{:02}",
                date.year() - ERA_OFFSET,
                date.month(),
                date.day()
            );
            let parsed = parse_roc_date(&roc).unwrap();
            assert_eq!(
                (parsed.year(), parsed.month(), parsed.day()),
                (date.year(), date.month(), date.day())
            );
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_round_trip_six_digit_years() {
        for roc_year in [1, 45, 99] {
            let roc = format!("{:02}0615", roc_year);
            let parsed = parse_roc_date(&roc).unwrap();
            assert_eq!(parsed, ymd(roc_year + ERA_OFFSET, 6, 15));
        }
    }
}
