//! Human-readable rendering of sizes and timestamps.

use chrono::{DateTime, FixedOffset};

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count with 1024-based units and one decimal place.
///
/// `0` is special-cased to `"0 B"`; everything else keeps the decimal,
/// so `1023` renders as `"1023.0 B"`.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{value:.1} {}", SIZE_UNITS[unit])
}

/// Parse an RFC 3339 timestamp as the daemon reports it.
///
/// The daemon emits nanosecond precision and either `Z` or a numeric offset.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw.trim()).ok()
}

/// Render a timestamp as `YYYY-MM-DD HH:MM`, or return the input unchanged
/// when it cannot be parsed.
pub fn format_datetime(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(ts) => ts.format("%Y-%m-%d %H:%M").to_string(),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1_048_576), "1.0 MB");
        assert_eq!(format_size(1_073_741_824), "1.0 GB");
    }

    #[test]
    fn test_format_size_fractional_and_small() {
        assert_eq!(format_size(512), "512.0 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3_825_200_000), "3.6 GB");
    }

    #[test]
    fn test_format_size_caps_at_terabytes() {
        let two_pb = 2 * 1024u64.pow(5);
        assert_eq!(format_size(two_pb), "2048.0 TB");
    }

    #[test]
    fn test_format_datetime_utc() {
        assert_eq!(format_datetime("2024-01-15T10:30:00Z"), "2024-01-15 10:30");
    }

    #[test]
    fn test_format_datetime_keeps_offset_and_nanos() {
        assert_eq!(
            format_datetime("2024-05-02T17:04:11.123456789-07:00"),
            "2024-05-02 17:04"
        );
    }

    #[test]
    fn test_format_datetime_passthrough() {
        assert_eq!(format_datetime("yesterday"), "yesterday");
        assert_eq!(format_datetime(""), "");
    }
}
