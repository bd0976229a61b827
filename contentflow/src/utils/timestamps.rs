//! Timestamp helpers.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC time as an ISO 8601 formatted string.
///
/// Format: `YYYY-MM-DDTHH:MM:SS.ffffff+00:00`
///
/// # Examples
///
/// ```
/// use contentflow::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.ends_with("+00:00"));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    format_iso8601(&Utc::now())
}

/// Formats a timestamp as ISO 8601 string.
#[must_use]
pub fn format_iso8601(dt: &Timestamp) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Parses the date formats found in RSS and Atom feeds.
///
/// RSS uses RFC 2822 (`Tue, 10 Jun 2003 04:00:00 GMT`), Atom uses RFC 3339.
/// A few feeds emit naive `YYYY-MM-DD HH:MM:SS`, which is read as UTC.
#[must_use]
pub fn parse_feed_date(input: &str) -> Option<Timestamp> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_rfc2822() {
        let dt = parse_feed_date("Tue, 10 Jun 2003 04:00:00 GMT").unwrap();
        assert_eq!(dt.year(), 2003);
        assert_eq!(dt.month(), 6);
    }

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_feed_date("2023-10-05T14:30:00Z").unwrap();
        assert_eq!(dt.day(), 5);
    }

    #[test]
    fn test_parse_naive() {
        assert!(parse_feed_date("2023-10-05 14:30:00").is_some());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_feed_date("").is_none());
        assert!(parse_feed_date("yesterday").is_none());
    }

    #[test]
    fn test_iso_timestamp_format() {
        let ts = iso_timestamp();
        assert!(ts.contains('T'));
        assert!(ts.ends_with("+00:00"));
    }
}
