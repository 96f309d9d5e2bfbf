//! Name-based entry points over the individual indicator states.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::domain::{Bar, LinePoint};
use crate::error::PipelineError;
use crate::indicators::bollinger::{BollingerParams, BollingerPoint, BollingerState};
use crate::indicators::kdj::{KdjParams, KdjPoint, KdjState};
use crate::indicators::patch::Patchable;
use crate::indicators::supertrend::{
    SupertrendParams, SupertrendPoint, SupertrendState, TrendSignal, supertrend_signals,
};
use crate::indicators::supertrend_ai::{
    SupertrendAiParams, SupertrendAiPoint, SupertrendAiState, supertrend_ai_signals,
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString, IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum IndicatorKind {
    #[strum(to_string = "bollinger", serialize = "bb")]
    Bollinger,
    #[strum(to_string = "kdj")]
    Kdj,
    #[strum(to_string = "supertrend", serialize = "st")]
    Supertrend,
    #[strum(to_string = "supertrend_ai", serialize = "stai")]
    SupertrendAi,
}

impl IndicatorKind {
    pub fn parse(name: &str) -> Result<Self, PipelineError> {
        Self::from_str(name.trim()).map_err(|_| PipelineError::UnknownIndicator(name.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum IndicatorParams {
    Bollinger(BollingerParams),
    Kdj(KdjParams),
    Supertrend(SupertrendParams),
    SupertrendAi(SupertrendAiParams),
}

impl IndicatorParams {
    pub fn default_for(kind: IndicatorKind) -> Self {
        match kind {
            IndicatorKind::Bollinger => IndicatorParams::Bollinger(BollingerParams::default()),
            IndicatorKind::Kdj => IndicatorParams::Kdj(KdjParams::default()),
            IndicatorKind::Supertrend => IndicatorParams::Supertrend(SupertrendParams::default()),
            IndicatorKind::SupertrendAi => IndicatorParams::SupertrendAi(SupertrendAiParams::default()),
        }
    }

    pub fn kind(&self) -> IndicatorKind {
        match self {
            IndicatorParams::Bollinger(_) => IndicatorKind::Bollinger,
            IndicatorParams::Kdj(_) => IndicatorKind::Kdj,
            IndicatorParams::Supertrend(_) => IndicatorKind::Supertrend,
            IndicatorParams::SupertrendAi(_) => IndicatorKind::SupertrendAi,
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        match self {
            IndicatorParams::Bollinger(p) => p.validate(),
            IndicatorParams::Kdj(p) => p.validate(),
            IndicatorParams::Supertrend(p) => p.validate(),
            IndicatorParams::SupertrendAi(p) => p.validate(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum IndicatorPoint {
    Bollinger(BollingerPoint),
    Kdj(KdjPoint),
    Supertrend(SupertrendPoint),
    SupertrendAi(SupertrendAiPoint),
}

impl IndicatorPoint {
    pub fn kind(&self) -> IndicatorKind {
        match self {
            IndicatorPoint::Bollinger(_) => IndicatorKind::Bollinger,
            IndicatorPoint::Kdj(_) => IndicatorKind::Kdj,
            IndicatorPoint::Supertrend(_) => IndicatorKind::Supertrend,
            IndicatorPoint::SupertrendAi(_) => IndicatorKind::SupertrendAi,
        }
    }

    pub fn time(&self) -> i64 {
        match self {
            IndicatorPoint::Bollinger(p) => p.time,
            IndicatorPoint::Kdj(p) => p.time,
            IndicatorPoint::Supertrend(p) => p.time,
            IndicatorPoint::SupertrendAi(p) => p.time,
        }
    }

    /// Named values drawn as lines, in a fixed order per indicator.
    pub fn line_values(&self) -> Vec<(&'static str, f64)> {
        match self {
            IndicatorPoint::Bollinger(p) => vec![("mid", p.mid), ("upper", p.upper), ("lower", p.lower)],
            IndicatorPoint::Kdj(p) => vec![("k", p.k), ("d", p.d), ("j", p.j)],
            IndicatorPoint::Supertrend(p) => vec![("supertrend", p.line)],
            IndicatorPoint::SupertrendAi(p) => {
                let mut values = vec![("band", p.band)];
                if let Some(ama) = p.ama {
                    values.push(("ama", ama));
                }
                values
            }
        }
    }
}

/// Full-history output of one indicator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSeries {
    pub kind: IndicatorKind,
    pub points: Vec<IndicatorPoint>,
    /// Trend flips (Supertrend family only)
    pub signals: Vec<TrendSignal>,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Split into one line series per drawn value. NaN (warm-up) points are skipped.
    pub fn lines(&self) -> Vec<(&'static str, Vec<LinePoint>)> {
        let mut lines: Vec<(&'static str, Vec<LinePoint>)> = Vec::new();
        for point in &self.points {
            for (i, (name, value)) in point.line_values().into_iter().enumerate() {
                if lines.len() <= i {
                    lines.push((name, Vec::with_capacity(self.points.len())));
                }
                if value.is_finite() {
                    lines[i].1.push(LinePoint::new(point.time(), value));
                }
            }
        }
        lines
    }
}

/// Caller-owned incremental state, threaded through every patch.
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorState {
    Bollinger(Patchable<BollingerState>),
    Kdj(Patchable<KdjState>),
    Supertrend(Patchable<SupertrendState>),
    SupertrendAi(Patchable<SupertrendAiState>),
}

impl IndicatorState {
    pub fn new(params: &IndicatorParams) -> Result<Self, PipelineError> {
        Ok(match params {
            IndicatorParams::Bollinger(p) => IndicatorState::Bollinger(Patchable::new(BollingerState::new(*p)?)),
            IndicatorParams::Kdj(p) => IndicatorState::Kdj(Patchable::new(KdjState::new(*p)?)),
            IndicatorParams::Supertrend(p) => {
                IndicatorState::Supertrend(Patchable::new(SupertrendState::new(*p)?))
            }
            IndicatorParams::SupertrendAi(p) => {
                IndicatorState::SupertrendAi(Patchable::new(SupertrendAiState::new(*p)?))
            }
        })
    }

    pub fn kind(&self) -> IndicatorKind {
        match self {
            IndicatorState::Bollinger(_) => IndicatorKind::Bollinger,
            IndicatorState::Kdj(_) => IndicatorKind::Kdj,
            IndicatorState::Supertrend(_) => IndicatorKind::Supertrend,
            IndicatorState::SupertrendAi(_) => IndicatorKind::SupertrendAi,
        }
    }

    /// Bucket time of the bar the state is currently open on.
    pub fn open_time(&self) -> Option<i64> {
        match self {
            IndicatorState::Bollinger(s) => s.open_time(),
            IndicatorState::Kdj(s) => s.open_time(),
            IndicatorState::Supertrend(s) => s.open_time(),
            IndicatorState::SupertrendAi(s) => s.open_time(),
        }
    }

    /// Fold one new or updated bar. `None` for a bar older than the open one.
    pub fn patch(&mut self, bar: &Bar) -> Option<IndicatorPoint> {
        match self {
            IndicatorState::Bollinger(s) => s.apply(bar, |st, b| st.step(b)).map(IndicatorPoint::Bollinger),
            IndicatorState::Kdj(s) => s.apply(bar, |st, b| st.step(b)).map(IndicatorPoint::Kdj),
            IndicatorState::Supertrend(s) => s.apply(bar, |st, b| st.step(b)).map(IndicatorPoint::Supertrend),
            IndicatorState::SupertrendAi(s) => {
                s.apply(bar, |st, b| st.step(b)).map(IndicatorPoint::SupertrendAi)
            }
        }
    }
}

/// Full compute that also returns the state positioned for live patching.
pub fn compute_indicator_with_state(
    params: &IndicatorParams,
    bars: &[Bar],
) -> Result<(IndicatorSeries, IndicatorState), PipelineError> {
    let (state, points, signals) = match params {
        IndicatorParams::Bollinger(p) => {
            let (state, out) = Patchable::from_history(BollingerState::new(*p)?, bars, |st, b| st.step(b));
            let points = out.into_iter().map(IndicatorPoint::Bollinger).collect();
            (IndicatorState::Bollinger(state), points, Vec::new())
        }
        IndicatorParams::Kdj(p) => {
            let (state, out) = Patchable::from_history(KdjState::new(*p)?, bars, |st, b| st.step(b));
            let points = out.into_iter().map(IndicatorPoint::Kdj).collect();
            (IndicatorState::Kdj(state), points, Vec::new())
        }
        IndicatorParams::Supertrend(p) => {
            let (state, out) = Patchable::from_history(SupertrendState::new(*p)?, bars, |st, b| st.step(b));
            let signals = supertrend_signals(bars, &out);
            let points = out.into_iter().map(IndicatorPoint::Supertrend).collect();
            (IndicatorState::Supertrend(state), points, signals)
        }
        IndicatorParams::SupertrendAi(p) => {
            let (state, out) =
                Patchable::from_history(SupertrendAiState::new(*p)?, bars, |st, b| st.step(b));
            let signals = supertrend_ai_signals(bars, &out);
            let points = out.into_iter().map(IndicatorPoint::SupertrendAi).collect();
            (IndicatorState::SupertrendAi(state), points, signals)
        }
    };
    let series = IndicatorSeries {
        kind: params.kind(),
        points,
        signals,
    };
    Ok((series, state))
}

/// `compute_indicator("kdj", bars, None)` uses the configured defaults.
pub fn compute_indicator(
    name: &str,
    bars: &[Bar],
    params: Option<IndicatorParams>,
) -> Result<IndicatorSeries, PipelineError> {
    let kind = IndicatorKind::parse(name)?;
    let params = match params {
        Some(p) if p.kind() != kind => {
            return Err(PipelineError::invalid(
                kind.into(),
                format!("parameters are for {}", p.kind()),
            ));
        }
        Some(p) => p,
        None => IndicatorParams::default_for(kind),
    };
    compute_indicator_with_state(&params, bars).map(|(series, _)| series)
}

/// Patch the state of indicator `name` with a new or updated bar.
///
/// `Ok(None)` when the bar is older than the state's open bar.
pub fn patch_indicator(
    name: &str,
    state: &mut IndicatorState,
    bar: &Bar,
) -> Result<Option<IndicatorPoint>, PipelineError> {
    let kind = IndicatorKind::parse(name)?;
    if state.kind() != kind {
        return Err(PipelineError::StateMismatch {
            expected: kind.into(),
            found: state.kind().into(),
        });
    }
    Ok(state.patch(bar))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_bars::walk;
    use strum::IntoEnumIterator;

    #[test]
    fn test_parse_names() {
        assert_eq!(IndicatorKind::parse("BB").unwrap(), IndicatorKind::Bollinger);
        assert_eq!(IndicatorKind::parse("supertrend_ai").unwrap(), IndicatorKind::SupertrendAi);
        assert_eq!(
            IndicatorKind::parse("macd"),
            Err(PipelineError::UnknownIndicator("macd".to_string()))
        );
    }

    #[test]
    fn test_patch_equals_full_compute() {
        let bars = walk(120, 17);
        for kind in IndicatorKind::iter() {
            let params = IndicatorParams::default_for(kind);
            let full = compute_indicator(&kind.to_string(), &bars, None).unwrap();

            // Load history up to bar 80, then stream the rest one bar at a time
            let (_, mut state) = compute_indicator_with_state(&params, &bars[..80]).unwrap();
            for (i, bar) in bars.iter().enumerate().skip(80) {
                let point = patch_indicator(&kind.to_string(), &mut state, bar)
                    .unwrap()
                    .expect("newer bar must patch");
                assert_eq!(
                    format!("{:?}", point),
                    format!("{:?}", full.points[i]),
                    "{} diverged at bar {}",
                    kind,
                    i
                );
            }
        }
    }

    #[test]
    fn test_replacing_open_bar_matches_recompute() {
        let mut bars = walk(60, 23);
        let params = IndicatorParams::default_for(IndicatorKind::SupertrendAi);
        let (_, mut state) = compute_indicator_with_state(&params, &bars).unwrap();

        // Several revisions of the last bar, as a live bucket would produce
        let last = bars.len() - 1;
        let mut patched = None;
        for close in [bars[last].close + 1.0, bars[last].close - 2.0, bars[last].close + 0.5] {
            bars[last].close = close;
            bars[last].high = bars[last].high.max(close);
            bars[last].low = bars[last].low.min(close);
            patched = state.patch(&bars[last]);
        }
        let (full, _) = compute_indicator_with_state(&params, &bars).unwrap();
        assert_eq!(
            format!("{:?}", patched),
            format!("{:?}", full.points.last())
        );
    }

    #[test]
    fn test_state_mismatch() {
        let params = IndicatorParams::default_for(IndicatorKind::Kdj);
        let (_, mut state) = compute_indicator_with_state(&params, &walk(10, 1)).unwrap();
        let err = patch_indicator("bollinger", &mut state, &Bar::flat(10_000, 1.0)).unwrap_err();
        assert_eq!(
            err,
            PipelineError::StateMismatch {
                expected: "bollinger",
                found: "kdj"
            }
        );
    }

    #[test]
    fn test_stale_bar_is_ignored() {
        let params = IndicatorParams::default_for(IndicatorKind::Bollinger);
        let (_, mut state) = compute_indicator_with_state(&params, &walk(30, 2)).unwrap();
        assert_eq!(patch_indicator("bb", &mut state, &Bar::flat(0, 1.0)).unwrap(), None);
    }

    #[test]
    fn test_lines_skip_warm_up() {
        let series = compute_indicator("bollinger", &walk(30, 4), None).unwrap();
        let lines = series.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].0, "mid");
        assert_eq!(lines[0].1.len(), 11);
    }

    #[test]
    fn test_mismatched_params_rejected() {
        let params = IndicatorParams::default_for(IndicatorKind::Kdj);
        assert!(compute_indicator("supertrend", &walk(10, 1), Some(params)).is_err());
    }

    #[test]
    fn test_supertrend_series_carries_signals() {
        let series = compute_indicator("st", &walk(400, 8), None).unwrap();
        assert_eq!(series.kind, IndicatorKind::Supertrend);
        for pair in series.signals.windows(2) {
            assert_ne!(pair[0].direction, pair[1].direction);
        }
    }

    #[test]
    fn test_ama_line_streams_like_full_compute() {
        let bars = walk(150, 31);
        let params = IndicatorParams::SupertrendAi(SupertrendAiParams {
            use_ama: true,
            ..Default::default()
        });
        let (full, _) = compute_indicator_with_state(&params, &bars).unwrap();
        let names: Vec<&str> = full.lines().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["band", "ama"]);

        let (_, mut state) = compute_indicator_with_state(&params, &bars[..100]).unwrap();
        for (i, bar) in bars.iter().enumerate().skip(100) {
            let point = state.patch(bar).expect("newer bar must patch");
            assert_eq!(format!("{:?}", point), format!("{:?}", full.points[i]));
        }
    }
}
