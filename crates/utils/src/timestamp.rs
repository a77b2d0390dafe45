//! Filesystem-safe UTC timestamps embedded in backup file names.
//!
//! A stamp is the millisecond ISO-8601 form with `:` and `.` swapped for `-`,
//! e.g. `2025-03-01T10:30:00.000Z` becomes `2025-03-01T10-30-00-000Z`.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use regex::Regex;

/// Regex fragment matching one stamp, without anchors.
pub const FILE_STAMP_PATTERN: &str = r"\d{4}-\d{2}-\d{2}T\d{2}-\d{2}-\d{2}-\d{3}Z";

static FILE_STAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})T(\d{2})-(\d{2})-(\d{2})-(\d{3})Z$")
        .expect("file stamp regex is valid")
});

pub fn file_stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

pub fn parse_file_stamp(stamp: &str) -> Option<DateTime<Utc>> {
    let caps = FILE_STAMP_RE.captures(stamp)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(2)?, field(3)?)?;
    let naive = date.and_hms_milli_opt(field(4)?, field(5)?, field(6)?, field(7)?)?;
    Some(naive.and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_file_stamp_replaces_separators() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 10, 30, 5).unwrap();
        assert_eq!(file_stamp(at), "2025-03-01T10-30-05-000Z");
    }

    #[test]
    fn test_parse_file_stamp_inverts_file_stamp() {
        let at = Utc.timestamp_millis_opt(1_740_825_005_123).unwrap();
        assert_eq!(parse_file_stamp(&file_stamp(at)), Some(at));
    }

    #[test]
    fn test_parse_file_stamp_rejects_garbage() {
        assert_eq!(parse_file_stamp("2025-03-01"), None);
        assert_eq!(parse_file_stamp("2025-13-01T10-30-05-000Z"), None);
        assert_eq!(parse_file_stamp("2025-03-01T10:30:05.000Z"), None);
    }
}
