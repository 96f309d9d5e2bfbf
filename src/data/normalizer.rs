//! Batch conversion of raw historical bars into a gap-free, bucket-aligned series.

use itertools::Itertools;

use crate::config::STREAM;
use crate::data::bucket_clock::BucketClock;
use crate::domain::{Bar, PriceSample, RawBar, Timeframe};
use crate::utils::time_utils::epoch_sec_to_utc;

/// Counters describing what `normalize_with_report` did to its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub input: usize,
    pub malformed: usize,
    /// Input elements folded into an already open bucket
    pub merged: usize,
    /// Synthetic flat bars inserted for skipped buckets
    pub filled: usize,
    /// Gaps longer than `STREAM.max_gap_fill`, left unfilled
    pub gaps_skipped: usize,
    pub output: usize,
}

/// Normalize on the default session calendar.
pub fn normalize(raw_bars: &[RawBar], tf: Timeframe) -> Vec<Bar> {
    normalize_with_report(raw_bars, tf, &BucketClock::default()).0
}

/// Sort, align, merge duplicates and flat-fill gaps.
///
/// Output is strictly ascending by bucket start with no duplicates. Skipped buckets
/// are filled with `O=H=L=C=previous close`, zero volume, unless the gap is longer
/// than `STREAM.max_gap_fill` buckets.
pub fn normalize_with_report(
    raw_bars: &[RawBar],
    tf: Timeframe,
    clock: &BucketClock,
) -> (Vec<Bar>, NormalizeReport) {
    normalize_capped(raw_bars, tf, clock, STREAM.max_gap_fill)
}

fn normalize_capped(
    raw_bars: &[RawBar],
    tf: Timeframe,
    clock: &BucketClock,
    max_gap_fill: usize,
) -> (Vec<Bar>, NormalizeReport) {
    let mut report = NormalizeReport {
        input: raw_bars.len(),
        ..Default::default()
    };

    let samples: Vec<PriceSample> = raw_bars.iter().filter_map(RawBar::parse).collect();
    report.malformed = raw_bars.len() - samples.len();

    // Stable sort: equal timestamps keep provider order, so "close = last" is well defined
    let samples = samples.into_iter().sorted_by_key(|s| s.time);

    let mut out: Vec<Bar> = Vec::with_capacity(raw_bars.len());
    for sample in samples {
        let start = clock.bucket_start(sample.time, tf);
        match out.last_mut() {
            Some(last) if last.time == start => {
                last.merge(&sample);
                report.merged += 1;
            }
            Some(last) => {
                let (prev_time, prev_close) = (last.time, last.close);
                let gap = clock.buckets_between(prev_time, start, tf) as usize;
                if gap > max_gap_fill {
                    report.gaps_skipped += 1;
                    log::warn!(
                        "normalize {}: gap of {} buckets from {} to {} left unfilled",
                        tf,
                        gap,
                        epoch_sec_to_utc(prev_time),
                        epoch_sec_to_utc(start)
                    );
                } else {
                    let mut fill = clock.next_bucket(prev_time, tf);
                    while fill < start {
                        out.push(Bar::flat(fill, prev_close));
                        report.filled += 1;
                        fill = clock.next_bucket(fill, tf);
                    }
                }
                out.push(Bar::seeded(start, &sample));
            }
            None => out.push(Bar::seeded(start, &sample)),
        }
    }

    report.output = out.len();
    if report.malformed > 0 || report.filled > 0 || report.gaps_skipped > 0 {
        log::debug!(
            "normalize {}: {} in, {} malformed, {} merged, {} filled, {} skipped gaps, {} out",
            tf,
            report.input,
            report.malformed,
            report.merged,
            report.filled,
            report.gaps_skipped,
            report.output
        );
    }
    (out, report)
}
