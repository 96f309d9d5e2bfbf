use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;
use serde::Serialize;

use crate::data::bucket_clock::BucketClock;
use crate::domain::{Bar, Timeframe};
use crate::utils::time_utils::epoch_sec_to_day;

/// Shape check of a bar series: ordering, duplicates, alignment and bars per UTC day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeriesReport {
    pub len: usize,
    /// Adjacent pairs where time does not strictly increase (includes duplicates)
    pub bad_order: usize,
    pub duplicates: usize,
    /// Bars whose time is not a bucket start
    pub misaligned: usize,
    pub per_day: BTreeMap<String, usize>,
}

impl SeriesReport {
    pub fn is_clean(&self) -> bool {
        self.bad_order == 0 && self.misaligned == 0
    }
}

impl fmt::Display for SeriesReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Last 5 days only, the full map gets long
        let sample = self
            .per_day
            .iter()
            .rev()
            .take(5)
            .rev()
            .map(|(day, n)| format!("{}={}", day, n))
            .join(", ");
        write!(
            f,
            "len={} bad_order={} dups={} misaligned={} per_day=[{}]",
            self.len, self.bad_order, self.duplicates, self.misaligned, sample
        )
    }
}

pub fn validate_series(bars: &[Bar], tf: Timeframe) -> SeriesReport {
    validate_series_with_clock(bars, tf, &BucketClock::default())
}

pub fn validate_series_with_clock(bars: &[Bar], tf: Timeframe, clock: &BucketClock) -> SeriesReport {
    let mut report = SeriesReport {
        len: bars.len(),
        ..Default::default()
    };

    for (prev, next) in bars.iter().tuple_windows() {
        if next.time <= prev.time {
            report.bad_order += 1;
        }
        if next.time == prev.time {
            report.duplicates += 1;
        }
    }

    for bar in bars {
        if clock.bucket_start(bar.time, tf) != bar.time {
            report.misaligned += 1;
        }
        *report.per_day.entry(epoch_sec_to_day(bar.time)).or_insert(0) += 1;
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_series() {
        let bars: Vec<Bar> = (0..5).map(|i| Bar::flat(i * 60, 1.0)).collect();
        let report = validate_series(&bars, Timeframe::Min1);
        assert!(report.is_clean());
        assert_eq!(report.len, 5);
        assert_eq!(report.per_day.get("1970-01-01"), Some(&5));
    }

    #[test]
    fn test_detects_disorder_duplicates_and_misalignment() {
        let bars = vec![
            Bar::flat(120, 1.0),
            Bar::flat(120, 1.0),
            Bar::flat(60, 1.0),
            Bar::flat(185, 1.0),
        ];
        let report = validate_series(&bars, Timeframe::Min1);
        assert_eq!(report.bad_order, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.misaligned, 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_empty_is_clean() {
        assert!(validate_series(&[], Timeframe::Day1).is_clean());
    }
}
