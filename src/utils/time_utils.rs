use chrono::{DateTime, Datelike, Utc};

pub struct TimeUtils;

impl TimeUtils {
    pub const SEC_IN_MIN: i64 = 60;
    pub const SEC_IN_5_MIN: i64 = Self::SEC_IN_MIN * 5;
    pub const SEC_IN_10_MIN: i64 = Self::SEC_IN_MIN * 10;
    pub const SEC_IN_15_MIN: i64 = Self::SEC_IN_MIN * 15;
    pub const SEC_IN_H: i64 = Self::SEC_IN_MIN * 60;
    pub const SEC_IN_4_H: i64 = Self::SEC_IN_H * 4;
    pub const SEC_IN_D: i64 = Self::SEC_IN_H * 24;
    pub const SEC_IN_W: i64 = Self::SEC_IN_D * 7;
    /// 1970-01-01 was a Thursday; the first Monday 00:00 UTC is four days later.
    pub const FIRST_MONDAY_SEC: i64 = Self::SEC_IN_D * 4;
    /// Numeric timestamps at or above these are read as epoch ms, µs and ns.
    pub const MS_THRESHOLD: f64 = 1e11;
    pub const US_THRESHOLD: f64 = 1e14;
    pub const NS_THRESHOLD: f64 = 1e17;
    /// 9999-12-31 23:59:59 UTC. Anything later is treated as malformed.
    pub const MAX_EPOCH_SEC: i64 = 253_402_300_799;
    pub const STANDARD_TIME_FORMAT: &str = "%Y-%m-%d";
    pub const STANDARD_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
}

/// Convert a numeric timestamp to whole epoch seconds.
///
/// The unit is picked by magnitude: seconds, then milliseconds, microseconds and
/// nanoseconds. Results past `MAX_EPOCH_SEC` are rejected.
pub fn numeric_to_epoch_sec(value: f64) -> Option<i64> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let scale = if value >= TimeUtils::NS_THRESHOLD {
        1e9
    } else if value >= TimeUtils::US_THRESHOLD {
        1e6
    } else if value >= TimeUtils::MS_THRESHOLD {
        1e3
    } else {
        1.0
    };
    let secs = (value / scale).floor();
    if secs > TimeUtils::MAX_EPOCH_SEC as f64 {
        return None;
    }
    Some(secs as i64)
}

/// Parse an RFC 3339 string, or a string holding a plain number, into epoch seconds.
pub fn text_to_epoch_sec(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        let secs = dt.timestamp();
        return (0..=TimeUtils::MAX_EPOCH_SEC).contains(&secs).then_some(secs);
    }
    trimmed.parse::<f64>().ok().and_then(numeric_to_epoch_sec)
}

/// Calendar day key (UTC) used to group bars in validation reports.
pub fn epoch_sec_to_day(epoch_sec: i64) -> String {
    match DateTime::from_timestamp(epoch_sec, 0) {
        Some(dt) => dt.format(TimeUtils::STANDARD_TIME_FORMAT).to_string(),
        None => String::new(),
    }
}

pub fn epoch_sec_to_utc(epoch_sec: i64) -> String {
    // Used for display purposes
    match DateTime::from_timestamp(epoch_sec, 0) {
        Some(dt) => dt.format(TimeUtils::STANDARD_DATETIME_FORMAT).to_string(),
        None => format!("<invalid {}>", epoch_sec),
    }
}

/// Days since Monday (0 = Monday) for a UTC timestamp.
pub fn weekday_from_monday(epoch_sec: i64) -> Option<u32> {
    DateTime::<Utc>::from_timestamp(epoch_sec, 0).map(|dt| dt.weekday().num_days_from_monday())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_seconds_and_millis() {
        assert_eq!(numeric_to_epoch_sec(1_700_000_000.0), Some(1_700_000_000));
        assert_eq!(numeric_to_epoch_sec(1_700_000_000_500.0), Some(1_700_000_000));
        assert_eq!(numeric_to_epoch_sec(f64::NAN), None);
        assert_eq!(numeric_to_epoch_sec(-5.0), None);
    }

    #[test]
    fn test_micro_and_nano_magnitudes() {
        assert_eq!(numeric_to_epoch_sec(1.7e15), Some(1_700_000_000));
        assert_eq!(numeric_to_epoch_sec(1_700_000_000_250_000.0), Some(1_700_000_000));
        assert_eq!(numeric_to_epoch_sec(1.7e18), Some(1_700_000_000));
        // Beyond any unit we know about
        assert_eq!(numeric_to_epoch_sec(1e30), None);
        assert_eq!(numeric_to_epoch_sec(f64::MAX), None);
    }

    #[test]
    fn test_text_timestamps() {
        assert_eq!(text_to_epoch_sec("1970-01-01T00:01:00Z"), Some(60));
        assert_eq!(text_to_epoch_sec("2024-03-04T14:30:00+00:00"), Some(1_709_562_600));
        assert_eq!(text_to_epoch_sec(" 120 "), Some(120));
        assert_eq!(text_to_epoch_sec("yesterday"), None);
    }

    #[test]
    fn test_first_monday() {
        assert_eq!(weekday_from_monday(TimeUtils::FIRST_MONDAY_SEC), Some(0));
        assert_eq!(epoch_sec_to_day(TimeUtils::FIRST_MONDAY_SEC), "1970-01-05");
    }
}
