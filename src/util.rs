/// Utility helpers used by all collectors.
///
/// This module contains:
/// - Time helpers
/// - Date parsing for stored records
///
/// IMPORTANT:
/// - No provider-specific business logic should live here.
/// - This module must remain lightweight and deterministic.
///

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Returns the current Unix timestamp in milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Calendar date `days` before `now`, formatted as `YYYY-MM-DD`.
///
/// Used for `from`/`to` query windows on historical endpoints.
pub fn days_before(now: DateTime<Utc>, days: i64) -> String {
    (now - Duration::days(days)).format("%Y-%m-%d").to_string()
}

/// Reads a date out of a stored record field.
///
/// Accepted shapes:
/// - RFC 3339 string ("2024-05-01T12:00:00Z")
/// - provider timestamp string ("2024-05-01 12:00:00"), taken as UTC
/// - plain date string ("2024-05-01"), midnight UTC
/// - epoch milliseconds (integer)
///
/// Anything else yields `None`; callers must leave such records alone.
pub fn parse_record_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(Utc.from_utc_datetime(&naive));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_all_supported_date_shapes() {
        let rfc = parse_record_date(&json!("2024-05-01T12:00:00Z")).unwrap();
        let spaced = parse_record_date(&json!("2024-05-01 12:00:00")).unwrap();
        let day = parse_record_date(&json!("2024-05-01")).unwrap();
        let millis = parse_record_date(&json!(rfc.timestamp_millis())).unwrap();

        assert_eq!(rfc, spaced);
        assert_eq!(rfc, millis);
        assert_eq!(day, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn rejects_unknown_shapes() {
        assert!(parse_record_date(&json!("yesterday")).is_none());
        assert!(parse_record_date(&json!(null)).is_none());
        assert!(parse_record_date(&json!({"date": 1})).is_none());
    }

    #[test]
    fn days_before_formats_calendar_date() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        assert_eq!(days_before(now, 1), "2024-02-29");
        assert_eq!(days_before(now, 0), "2024-03-01");
    }
}
