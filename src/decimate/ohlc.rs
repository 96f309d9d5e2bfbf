//! OHLC-aware decimation: consecutive candles are folded into wider synthetic candles
//! whose boundaries sit on a fixed origin, so panning never reflows earlier buckets.

use serde::{Deserialize, Serialize};

use crate::config::{DECIMATION, SESSION, SessionCalendar};
use crate::domain::Bar;
use crate::error::PipelineError;
use crate::utils::maths_utils::floor_to_lattice;

/// Inclusive time range in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleRange {
    pub from: i64,
    pub to: i64,
}

impl VisibleRange {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, time: i64) -> bool {
        time >= self.from && time <= self.to
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcOptions {
    pub points_per_pixel: f64,
    pub device_pixel_ratio: f64,
    pub min_budget: usize,
    /// Share of the budget given to the focus range
    pub focus_share: f64,
    pub origin: i64,
    /// When set, no synthetic bucket spans this calendar's session close
    pub session: Option<SessionCalendar>,
}

impl Default for OhlcOptions {
    fn default() -> Self {
        Self {
            points_per_pixel: DECIMATION.points_per_pixel,
            device_pixel_ratio: DECIMATION.device_pixel_ratio,
            min_budget: DECIMATION.min_ohlc_budget,
            focus_share: DECIMATION.focus_share,
            origin: DECIMATION.origin_sec,
            session: DECIMATION.session_guard.then_some(SESSION),
        }
    }
}

impl OhlcOptions {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.points_per_pixel.is_finite() && self.points_per_pixel > 0.0) {
            return Err(PipelineError::invalid("decimator", "points_per_pixel must be positive"));
        }
        if !(self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0) {
            return Err(PipelineError::invalid("decimator", "device_pixel_ratio must be positive"));
        }
        if !(0.0..=1.0).contains(&self.focus_share) {
            return Err(PipelineError::invalid(
                "decimator",
                format!("focus_share must be within [0, 1], got {}", self.focus_share),
            ));
        }
        Ok(())
    }

    /// Number of synthetic candles a chart `pixel_width` CSS pixels wide can show.
    pub fn point_budget(&self, pixel_width: f64) -> usize {
        let raw = (pixel_width.max(0.0) * self.device_pixel_ratio * self.points_per_pixel).ceil();
        (raw as usize).max(self.min_budget)
    }
}

/// Bars of a time-sorted slice that fall inside `range`.
pub fn visible_slice(bars: &[Bar], range: VisibleRange) -> &[Bar] {
    let start = bars.partition_point(|b| b.time < range.from);
    let end = bars.partition_point(|b| b.time <= range.to);
    &bars[start..end.max(start)]
}

/// Fold `bars` into buckets `width` seconds wide on a lattice through `origin`.
///
/// Each bucket keeps the first open, max high, min low, last close and summed volume.
/// Labels are the bucket start, raised to `floor_time` if lower. With a `session`, a
/// bucket containing a session close is cut there and the remainder is labelled with
/// the close time.
pub fn fold_ohlc(
    bars: &[Bar],
    width: i64,
    origin: i64,
    floor_time: i64,
    session: Option<&SessionCalendar>,
) -> Vec<Bar> {
    let width = width.max(1);
    let mut out: Vec<Bar> = Vec::new();
    let mut current_start: Option<i64> = None;
    for bar in bars {
        let mut start = floor_to_lattice(bar.time, width, origin);
        if let Some(calendar) = session {
            start = start.max(calendar.last_close_at_or_before(bar.time));
        }
        if current_start == Some(start) {
            if let Some(last) = out.last_mut() {
                last.high = last.high.max(bar.high);
                last.low = last.low.min(bar.low);
                last.close = bar.close;
                last.volume += bar.volume;
                continue;
            }
        }
        current_start = Some(start);
        out.push(Bar {
            time: start.max(floor_time),
            ..*bar
        });
    }
    out
}

/// Decimate candles to at most about `budget` synthetic candles (plus one per session
/// close crossed when the guard is on).
pub fn decimate_ohlc(bars: &[Bar], budget: usize, options: &OhlcOptions) -> Vec<Bar> {
    decimate_segment(bars, budget, options, i64::MIN)
}

fn decimate_segment(bars: &[Bar], budget: usize, options: &OhlcOptions, floor_time: i64) -> Vec<Bar> {
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return Vec::new();
    };
    if bars.len() <= budget.max(1) {
        return bars.to_vec();
    }
    let span = last.time - first.time;
    let width = (span as f64 / budget.max(1) as f64).ceil() as i64;
    fold_ohlc(bars, width, options.origin, floor_time, options.session.as_ref())
}

/// Visible-range decimation for a chart `pixel_width` CSS pixels wide.
pub fn decimate_ohlc_visible(
    bars: &[Bar],
    range: VisibleRange,
    pixel_width: f64,
    options: &OhlcOptions,
) -> Vec<Bar> {
    let visible = visible_slice(bars, range);
    decimate_ohlc(visible, options.point_budget(pixel_width), options)
}

/// Split `total` between a focus range and the tails on either side.
///
/// The focus gets `focus_share` of the budget; the tails share the rest in proportion
/// to their bar counts. With no tails the focus gets everything.
pub fn focus_budgets(total: usize, focus_share: f64, left_len: usize, right_len: usize) -> (usize, usize, usize) {
    let tails = left_len + right_len;
    if tails == 0 {
        return (0, total, 0);
    }
    let focus = ((total as f64) * focus_share).round() as usize;
    let focus = focus.min(total);
    let rest = total - focus;
    let left = ((rest as f64) * left_len as f64 / tails as f64).round() as usize;
    let left = left.min(rest);
    (left, focus, rest - left)
}

/// Decimate the whole series, spending most of the budget on `focus`.
pub fn decimate_ohlc_focus(bars: &[Bar], focus: VisibleRange, budget: usize, options: &OhlcOptions) -> Vec<Bar> {
    let left_end = bars.partition_point(|b| b.time < focus.from);
    let right_start = bars.partition_point(|b| b.time <= focus.to).max(left_end);
    let (left, middle, right) = (&bars[..left_end], &bars[left_end..right_start], &bars[right_start..]);

    let (left_budget, focus_budget, right_budget) =
        focus_budgets(budget, options.focus_share, left.len(), right.len());

    let mut out = decimate_segment(left, left_budget.max(1), options, i64::MIN);
    if let Some(first) = middle.first() {
        out.extend(decimate_segment(middle, focus_budget.max(1), options, first.time));
    }
    if let Some(first) = right.first() {
        out.extend(decimate_segment(right, right_budget.max(1), options, first.time));
    }
    out
}
