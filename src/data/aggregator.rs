//! Live tick folding for one (symbol, timeframe) subscription.

use std::collections::VecDeque;

use serde::Serialize;

#[cfg(debug_assertions)]
use crate::config::debug::{PRINT_DROPPED_TICKS, PRINT_SERIES_VALIDATION, PRINT_STREAM_EVENTS};
use crate::config::STREAM;
use crate::data::bucket_clock::BucketClock;
use crate::data::validation::{SeriesReport, validate_series_with_clock};
use crate::domain::{Bar, Tick, Timeframe};
use crate::error::PipelineError;
use crate::utils::time_utils::epoch_sec_to_utc;

/// How a render surface must apply an emitted bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpdateKind {
    /// A new bucket opened (real or synthetic filler)
    Append,
    /// Same bucket as the previous emission: overwrite, don't append
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BarUpdate {
    pub bar: Bar,
    pub kind: UpdateKind,
}

impl BarUpdate {
    pub fn is_new_bucket(&self) -> bool {
        self.kind == UpdateKind::Append
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregatorStats {
    pub appended: u64,
    pub replaced: u64,
    pub filled: u64,
    pub dropped_late: u64,
    pub dropped_malformed: u64,
    /// Gaps too long to fill, re-anchored without fillers
    pub gaps_skipped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorOptions {
    pub history_limit: usize,
    /// 0 disables periodic validation
    pub validate_every: u64,
    pub max_gap_fill: u64,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            history_limit: STREAM.history_limit,
            validate_every: STREAM.validate_every as u64,
            max_gap_fill: STREAM.max_gap_fill as u64,
        }
    }
}

impl AggregatorOptions {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.history_limit < 2 {
            return Err(PipelineError::invalid(
                "aggregator",
                format!("history_limit must be at least 2, got {}", self.history_limit),
            ));
        }
        Ok(())
    }
}

/// State machine `EMPTY -> OPEN -> (OPEN | CLOSED -> OPEN)` folding ticks into bars.
///
/// One instance per live subscription; it is never shared between producers.
#[derive(Debug)]
pub struct StreamAggregator {
    label: String,
    tf: Timeframe,
    clock: BucketClock,
    options: AggregatorOptions,

    last_bucket_start: Option<i64>,
    current_bar: Option<Bar>,
    update_count: u64,

    history: VecDeque<Bar>,
    stats: AggregatorStats,
    last_report: Option<SeriesReport>,
    // One warning per subscription, later drops only reach the debug log
    warned_drop: bool,
}

impl StreamAggregator {
    pub fn new(label: impl Into<String>, tf: Timeframe) -> Self {
        Self::build(label.into(), tf, BucketClock::default(), AggregatorOptions::default())
    }

    pub fn with_options(
        label: impl Into<String>,
        tf: Timeframe,
        clock: BucketClock,
        options: AggregatorOptions,
    ) -> Result<Self, PipelineError> {
        options.validate()?;
        Ok(Self::build(label.into(), tf, clock, options))
    }

    fn build(label: String, tf: Timeframe, clock: BucketClock, options: AggregatorOptions) -> Self {
        Self {
            label,
            tf,
            clock,
            options,
            last_bucket_start: None,
            current_bar: None,
            update_count: 0,
            history: VecDeque::with_capacity(options.history_limit.min(256)),
            stats: AggregatorStats::default(),
            last_report: None,
            warned_drop: false,
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.tf
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn last_bucket_start(&self) -> Option<i64> {
        self.last_bucket_start
    }

    pub fn current_bar(&self) -> Option<&Bar> {
        self.current_bar.as_ref()
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn stats(&self) -> AggregatorStats {
        self.stats
    }

    pub fn history(&self) -> &VecDeque<Bar> {
        &self.history
    }

    pub fn last_report(&self) -> Option<&SeriesReport> {
        self.last_report.as_ref()
    }

    /// Continue from the tail of a loaded history instead of starting EMPTY.
    ///
    /// The bar becomes the open bucket: a tick in the same bucket replaces it, a later tick
    /// gap-fills from its close. Emits nothing.
    pub fn prime(&mut self, last_bar: Bar) {
        let start = self.clock.bucket_start(last_bar.time, self.tf);
        if self.last_bucket_start.is_some_and(|current| start < current) {
            return;
        }
        let bar = Bar { time: start, ..last_bar };
        self.last_bucket_start = Some(start);
        self.current_bar = Some(bar);
        self.push_history(bar, false);
    }

    /// Fold one tick. Returns the updates to render, in order.
    ///
    /// Empty when the tick was dropped (malformed or late). Never fails.
    pub fn handle_tick(&mut self, tick: &Tick) -> Vec<BarUpdate> {
        let Some(sample) = tick.parse() else {
            self.stats.dropped_malformed += 1;
            self.note_drop("malformed", tick);
            return Vec::new();
        };
        let start = self.clock.bucket_start(sample.time, self.tf);

        if let Some(last) = self.last_bucket_start {
            if start < last {
                self.stats.dropped_late += 1;
                self.note_drop("late", tick);
                return Vec::new();
            }
            if start == last {
                if let Some(bar) = self.current_bar.as_mut() {
                    bar.merge(&sample);
                    let merged = *bar;
                    return vec![self.emit(merged, UpdateKind::Replace)];
                }
            }
        }

        let mut updates = self.fill_gaps(start);
        updates.push(self.emit(Bar::seeded(start, &sample), UpdateKind::Append));
        updates
    }

    /// Flat bars for every bucket between the open one and `target_start` (exclusive).
    ///
    /// Gaps longer than `max_gap_fill` buckets get no fillers at all.
    fn fill_gaps(&mut self, target_start: i64) -> Vec<BarUpdate> {
        let (Some(last), Some(prev)) = (self.last_bucket_start, self.current_bar) else {
            return Vec::new();
        };
        let gap = self.clock.buckets_between(last, target_start, self.tf) as u64;
        if gap > self.options.max_gap_fill {
            self.stats.gaps_skipped += 1;
            log::warn!(
                "[{}] gap of {} buckets from {} to {} exceeds {}, re-anchoring without fillers",
                self.label,
                gap,
                epoch_sec_to_utc(last),
                epoch_sec_to_utc(target_start),
                self.options.max_gap_fill
            );
            return Vec::new();
        }
        let mut updates = Vec::with_capacity(gap as usize);
        let mut fill = self.clock.next_bucket(last, self.tf);
        while fill < target_start {
            updates.push(self.emit(Bar::flat(fill, prev.close), UpdateKind::Append));
            self.stats.filled += 1;
            fill = self.clock.next_bucket(fill, self.tf);
        }
        updates
    }

    fn emit(&mut self, bar: Bar, kind: UpdateKind) -> BarUpdate {
        match kind {
            UpdateKind::Append => {
                self.last_bucket_start = Some(bar.time);
                self.stats.appended += 1;
            }
            UpdateKind::Replace => self.stats.replaced += 1,
        }
        self.current_bar = Some(bar);
        self.push_history(bar, kind == UpdateKind::Replace);
        self.update_count += 1;

        #[cfg(debug_assertions)]
        if PRINT_STREAM_EVENTS {
            log::debug!("[{}] {:?} {:?}", self.label, kind, bar);
        }

        if self.options.validate_every > 0
            && self.history.len() > 1
            && self.update_count % self.options.validate_every == 0
        {
            self.run_validation();
        }
        BarUpdate { bar, kind }
    }

    fn push_history(&mut self, bar: Bar, replace: bool) {
        if replace {
            if let Some(last) = self.history.back_mut() {
                *last = bar;
                return;
            }
        }
        self.history.push_back(bar);
        while self.history.len() > self.options.history_limit {
            self.history.pop_front();
        }
    }

    fn run_validation(&mut self) {
        let bars: Vec<Bar> = self.history.iter().copied().collect();
        let report = validate_series_with_clock(&bars, self.tf, &self.clock);
        if !report.is_clean() {
            log::warn!("[validate {}] tf={} {}", self.label, self.tf, report);
        } else {
            #[cfg(debug_assertions)]
            if PRINT_SERIES_VALIDATION {
                log::info!("[validate {}] tf={} {}", self.label, self.tf, report);
            }
        }
        self.last_report = Some(report);
    }

    fn note_drop(&mut self, reason: &str, tick: &Tick) {
        if !self.warned_drop {
            self.warned_drop = true;
            log::warn!(
                "[{}] dropping {} tick {:?} (further drops on this subscription are counted silently)",
                self.label,
                reason,
                tick.time
            );
            return;
        }
        #[cfg(debug_assertions)]
        if PRINT_DROPPED_TICKS {
            log::debug!("[{}] dropped {} tick {:?}", self.label, reason, tick.time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawBar;

    fn agg() -> StreamAggregator {
        StreamAggregator::new("test", Timeframe::Min1)
    }

    #[test]
    fn test_same_bucket_tick_replaces() {
        let mut agg = agg();
        let first = agg.handle_tick(&RawBar::new(0_i64, 10.0, 11.0, 9.0, 10.5, 1.0));
        assert_eq!(first.len(), 1);
        assert!(first[0].is_new_bucket());

        let second = agg.handle_tick(&RawBar::from_price(1_i64, 10.8));
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].kind, UpdateKind::Replace);
        assert_eq!(second[0].bar, Bar::new(0, 10.0, 11.0, 9.0, 10.8, 1.0));
        assert_eq!(agg.history().len(), 1, "replace must not add a bar");
    }

    #[test]
    fn test_gap_emits_flat_fillers_then_real_bar() {
        let mut agg = agg();
        agg.handle_tick(&RawBar::new(0_i64, 10.0, 11.0, 9.0, 10.5, 1.0));
        let updates = agg.handle_tick(&RawBar::new(240_i64, 12.0, 12.5, 11.5, 12.2, 2.0));

        let times: Vec<i64> = updates.iter().map(|u| u.bar.time).collect();
        assert_eq!(times, vec![60, 120, 180, 240]);
        assert!(updates.iter().all(|u| u.is_new_bucket()));
        for filler in &updates[..3] {
            assert_eq!(filler.bar, Bar::flat(filler.bar.time, 10.5));
        }
        assert_eq!(updates[3].bar.close, 12.2);
        assert_eq!(agg.last_bucket_start(), Some(240));
        assert_eq!(agg.stats().filled, 3);
    }

    #[test]
    fn test_late_tick_is_dropped_without_regressing() {
        let mut agg = agg();
        agg.handle_tick(&RawBar::from_price(120_i64, 5.0));
        assert!(agg.handle_tick(&RawBar::from_price(30_i64, 4.0)).is_empty());
        assert_eq!(agg.last_bucket_start(), Some(120));
        assert_eq!(agg.current_bar().map(|b| b.close), Some(5.0));
        assert_eq!(agg.stats().dropped_late, 1);
    }

    #[test]
    fn test_malformed_tick_is_dropped_and_counted() {
        let mut agg = agg();
        assert!(agg.handle_tick(&RawBar::from_price(0_i64, f64::NAN)).is_empty());
        assert!(agg.handle_tick(&RawBar::from_price("yesterday", 1.0)).is_empty());
        assert_eq!(agg.stats().dropped_malformed, 2);
        assert_eq!(agg.last_bucket_start(), None);
    }

    #[test]
    fn test_primed_aggregator_continues_history() {
        let mut agg = agg();
        agg.prime(Bar::new(60, 1.0, 2.0, 0.5, 1.5, 10.0));
        let replace = agg.handle_tick(&RawBar::from_price(90_i64, 1.7));
        assert_eq!(replace[0].kind, UpdateKind::Replace);
        assert_eq!(replace[0].bar, Bar::new(60, 1.0, 2.0, 0.5, 1.7, 10.0));

        let append = agg.handle_tick(&RawBar::from_price(200_i64, 1.9));
        assert_eq!(append.len(), 2);
        assert_eq!(append[0].bar, Bar::flat(120, 1.7));
    }

    #[test]
    fn test_history_is_bounded_and_validated() {
        let options = AggregatorOptions {
            history_limit: 8,
            validate_every: 4,
            ..Default::default()
        };
        let mut agg =
            StreamAggregator::with_options("bounded", Timeframe::Min1, BucketClock::default(), options)
                .unwrap();
        for i in 0..20_i64 {
            agg.handle_tick(&RawBar::from_price(i * 60, 1.0 + i as f64));
        }
        assert_eq!(agg.history().len(), 8);
        assert_eq!(agg.history().front().map(|b| b.time), Some(12 * 60));
        let report = agg.last_report().expect("validation should have run");
        assert!(report.is_clean());
    }

    #[test]
    fn test_rejects_tiny_history() {
        let options = AggregatorOptions {
            history_limit: 1,
            validate_every: 0,
            ..Default::default()
        };
        assert!(
            StreamAggregator::with_options("bad", Timeframe::Min1, BucketClock::default(), options)
                .is_err()
        );
    }

    #[test]
    fn test_microsecond_tick_lands_in_the_open_bucket() {
        let mut agg = agg();
        agg.handle_tick(&RawBar::from_price(1_700_000_000_i64, 100.0));
        let updates = agg.handle_tick(&RawBar::from_price(1.7e15_f64, 101.0));
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].kind, UpdateKind::Replace);
        assert_eq!(updates[0].bar.close, 101.0);
        assert_eq!(agg.stats().filled, 0);
    }

    #[test]
    fn test_out_of_range_tick_is_malformed() {
        let mut agg = agg();
        agg.handle_tick(&RawBar::from_price(1_700_000_000_i64, 100.0));
        assert!(agg.handle_tick(&RawBar::from_price(1e30_f64, 101.0)).is_empty());
        assert_eq!(agg.stats().dropped_malformed, 1);
        assert_eq!(agg.history().len(), 1);
    }

    #[test]
    fn test_oversized_gap_reanchors_without_fillers() {
        let options = AggregatorOptions {
            max_gap_fill: 5,
            ..Default::default()
        };
        let mut agg =
            StreamAggregator::with_options("capped", Timeframe::Min1, BucketClock::default(), options)
                .unwrap();
        agg.handle_tick(&RawBar::from_price(0_i64, 1.0));

        // Five missing buckets is still filled
        let filled = agg.handle_tick(&RawBar::from_price(6 * 60_i64, 2.0));
        assert_eq!(filled.len(), 6);

        // Six is not: only the new bar is appended and the series continues from it
        let jumped = agg.handle_tick(&RawBar::from_price(13 * 60_i64, 3.0));
        assert_eq!(jumped.len(), 1);
        assert_eq!(jumped[0].bar.time, 13 * 60);
        assert!(jumped[0].is_new_bucket());
        assert_eq!(agg.last_bucket_start(), Some(13 * 60));
        assert_eq!(agg.stats().gaps_skipped, 1);
        assert_eq!(agg.stats().filled, 5);

        let next = agg.handle_tick(&RawBar::from_price(15 * 60_i64, 4.0));
        assert_eq!(next.len(), 2);
        assert_eq!(next[0].bar, Bar::flat(14 * 60, 3.0));
    }
}
