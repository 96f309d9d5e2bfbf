//! Maps timestamps onto timeframe buckets.
//!
//! Intraday buckets are laid on a lattice through the session open, so a 10-minute bar
//! always starts at `open + k * 10min`. Every intraday length divides a day, which makes
//! the lattice identical for every calendar day. Daily buckets start at 00:00 UTC and
//! weekly buckets on Monday 00:00 UTC.

use crate::config::{SESSION, SessionCalendar};
use crate::domain::Timeframe;
use crate::utils::TimeUtils;
use crate::utils::maths_utils::{floor_div, floor_to_lattice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BucketClock {
    calendar: SessionCalendar,
}

impl BucketClock {
    pub fn new(calendar: SessionCalendar) -> Self {
        Self { calendar }
    }

    pub fn bucket_length_sec(&self, tf: Timeframe) -> i64 {
        tf.seconds()
    }

    /// Start (epoch seconds) of the bucket containing `timestamp_sec`. Idempotent.
    pub fn bucket_start(&self, timestamp_sec: i64, tf: Timeframe) -> i64 {
        let step = tf.seconds();
        match tf {
            Timeframe::Day1 => floor_to_lattice(timestamp_sec, step, 0),
            Timeframe::Week1 => floor_to_lattice(timestamp_sec, step, TimeUtils::FIRST_MONDAY_SEC),
            _ => floor_to_lattice(timestamp_sec, step, self.calendar.open_offset_sec),
        }
    }

    /// Start of the bucket immediately after the one starting at `bucket_start`.
    pub fn next_bucket(&self, bucket_start: i64, tf: Timeframe) -> i64 {
        bucket_start + tf.seconds()
    }

    /// Whole buckets strictly between two bucket starts.
    pub fn buckets_between(&self, earlier: i64, later: i64, tf: Timeframe) -> i64 {
        (floor_div(later - earlier, tf.seconds()) - 1).max(0)
    }
}

impl SessionCalendar {
    /// Most recent session close at or before `timestamp_sec`.
    pub fn last_close_at_or_before(&self, timestamp_sec: i64) -> i64 {
        floor_to_lattice(timestamp_sec, TimeUtils::SEC_IN_D, self.close_offset_sec)
    }
}

/// `bucket_start` on the default session calendar.
pub fn bucket_start(timestamp_sec: i64, tf: Timeframe) -> i64 {
    BucketClock::new(SESSION).bucket_start(timestamp_sec, tf)
}

/// `bucket_length_sec` on the default session calendar.
pub fn bucket_length_sec(tf: Timeframe) -> i64 {
    tf.seconds()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time_utils::weekday_from_monday;
    use strum::IntoEnumIterator;

    // 2024-03-04 (a Monday) 00:00 UTC
    const MONDAY: i64 = 1_709_510_400;
    const OPEN: i64 = MONDAY + 14 * 3600 + 30 * 60;

    #[test]
    fn test_idempotent_for_all_timeframes() {
        let clock = BucketClock::default();
        let samples = [0, 1, 59, 61, OPEN - 1, OPEN, OPEN + 599, OPEN + 601, MONDAY + 86_399, -7_777];
        for tf in Timeframe::iter() {
            for &t in &samples {
                let start = clock.bucket_start(t, tf);
                assert!(start <= t, "{} bucket start {} after {}", tf, start, t);
                assert!(t - start < tf.seconds(), "{} bucket too far from {}", tf, t);
                assert_eq!(clock.bucket_start(start, tf), start, "{} not idempotent at {}", tf, t);
            }
        }
    }

    #[test]
    fn test_ten_minute_buckets_anchor_on_session_open() {
        let clock = BucketClock::default();
        assert_eq!(clock.bucket_start(OPEN + 9 * 60 + 59, Timeframe::Min10), OPEN);
        assert_eq!(clock.bucket_start(OPEN + 10 * 60, Timeframe::Min10), OPEN + 600);
        // Before the open the same lattice continues backwards
        assert_eq!(clock.bucket_start(OPEN - 1, Timeframe::Min10), OPEN - 600);
    }

    #[test]
    fn test_four_hour_buckets_anchor_on_session_open() {
        let clock = BucketClock::default();
        assert_eq!(clock.bucket_start(OPEN + 3 * 3600, Timeframe::Hour4), OPEN);
        assert_eq!(clock.bucket_start(OPEN + 4 * 3600, Timeframe::Hour4), OPEN + 4 * 3600);
        // 14:30 - 4h = 10:30 UTC
        assert_eq!(clock.bucket_start(MONDAY + 11 * 3600, Timeframe::Hour4), OPEN - 4 * 3600);
    }

    #[test]
    fn test_daily_and_weekly_boundaries() {
        let clock = BucketClock::default();
        assert_eq!(clock.bucket_start(OPEN, Timeframe::Day1), MONDAY);
        let wednesday = MONDAY + 2 * 86_400 + 5_000;
        let week = clock.bucket_start(wednesday, Timeframe::Week1);
        assert_eq!(week, MONDAY);
        assert_eq!(weekday_from_monday(week), Some(0));
    }

    #[test]
    fn test_custom_calendar_shifts_lattice() {
        let clock = BucketClock::new(SessionCalendar {
            open_offset_sec: 13 * 3600 + 30 * 60,
            close_offset_sec: 20 * 3600,
        });
        let open = MONDAY + 13 * 3600 + 30 * 60;
        assert_eq!(clock.bucket_start(open + 1_000, Timeframe::Hour1), open);
    }

    #[test]
    fn test_last_close() {
        let close = MONDAY + 21 * 3600;
        assert_eq!(SESSION.last_close_at_or_before(close), close);
        assert_eq!(SESSION.last_close_at_or_before(close + 5), close);
        assert_eq!(SESSION.last_close_at_or_before(OPEN), close - 86_400);
    }

    #[test]
    fn test_buckets_between() {
        let clock = BucketClock::default();
        assert_eq!(clock.buckets_between(0, 240, Timeframe::Min1), 3);
        assert_eq!(clock.buckets_between(0, 60, Timeframe::Min1), 0);
    }
}
