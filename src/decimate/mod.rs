// Budget-driven reduction of series before they reach a render surface
pub mod lttb;
pub mod ohlc;

pub use lttb::lttb;
pub use ohlc::{
    OhlcOptions, VisibleRange, decimate_ohlc, decimate_ohlc_focus, decimate_ohlc_visible, focus_budgets,
    visible_slice,
};

use crate::domain::{LinePoint, Series};

/// Reduce `series` to about `budget` points, optionally restricted to `visible`.
///
/// Candles go through the OHLC-aware fold, lines through LTTB. The result is always a
/// full replacement (`setData`), never a patch.
pub fn decimate(series: &Series, budget: usize, visible: Option<VisibleRange>) -> Series {
    match series {
        Series::Candles(bars) => {
            let bars = match visible {
                Some(range) => visible_slice(bars, range),
                None => bars.as_slice(),
            };
            Series::Candles(decimate_ohlc(bars, budget, &OhlcOptions::default()))
        }
        Series::Line(points) => {
            let points = match visible {
                Some(range) => visible_points(points, range),
                None => points.as_slice(),
            };
            Series::Line(lttb(points, budget))
        }
    }
}

fn visible_points(points: &[LinePoint], range: VisibleRange) -> &[LinePoint] {
    let start = points.partition_point(|p| p.time < range.from);
    let end = points.partition_point(|p| p.time <= range.to).max(start);
    &points[start..end]
}
