use serde::{Deserialize, Serialize};

use crate::config::INDICATORS;
use crate::domain::Bar;
use crate::error::PipelineError;
use crate::indicators::smoothing::AtrState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    pub fn sign(&self) -> f64 {
        match self {
            Trend::Up => 1.0,
            Trend::Down => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupertrendParams {
    pub atr_period: usize,
    pub factor: f64,
}

impl Default for SupertrendParams {
    fn default() -> Self {
        Self {
            atr_period: INDICATORS.supertrend.atr_period,
            factor: INDICATORS.supertrend.factor,
        }
    }
}

impl SupertrendParams {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.atr_period == 0 {
            return Err(PipelineError::invalid("supertrend", "atr_period must be at least 1"));
        }
        validate_factor("supertrend", self.factor)
    }
}

pub(crate) fn validate_factor(component: &'static str, factor: f64) -> Result<(), PipelineError> {
    if !factor.is_finite() || factor < 0.0 {
        return Err(PipelineError::invalid(
            component,
            format!("factor must be finite and non-negative, got {}", factor),
        ));
    }
    Ok(())
}

/// Band values for one bar; NaN and no trend until the ATR is defined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SupertrendPoint {
    pub time: i64,
    pub upper: f64,
    pub lower: f64,
    /// The active band: lower in an uptrend, upper in a downtrend
    pub line: f64,
    pub trend: Option<Trend>,
}

/// Emitted on every trend flip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendSignal {
    pub time: i64,
    pub price: f64,
    pub direction: Trend,
}

/// Trend-following bands for a single factor, driven by an externally supplied ATR.
#[derive(Debug, Clone, PartialEq)]
pub struct BandState {
    factor: f64,
    upper: f64,
    lower: f64,
    trend: Option<Trend>,
    prev_close: Option<f64>,
}

impl BandState {
    pub fn new(factor: f64) -> Self {
        Self {
            factor,
            upper: f64::NAN,
            lower: f64::NAN,
            trend: None,
            prev_close: None,
        }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn trend(&self) -> Option<Trend> {
        self.trend
    }

    pub fn step(&mut self, bar: &Bar, atr: Option<f64>) -> SupertrendPoint {
        let prev_close = self.prev_close.replace(bar.close);
        let Some(atr) = atr else {
            return SupertrendPoint {
                time: bar.time,
                upper: f64::NAN,
                lower: f64::NAN,
                line: f64::NAN,
                trend: None,
            };
        };

        let mid = bar.hl2();
        let basic_upper = mid + self.factor * atr;
        let basic_lower = mid - self.factor * atr;

        let trend = match (self.trend, prev_close) {
            (Some(trend), Some(pc)) => {
                // Upper only moves down, lower only up, unless price closed through them
                self.upper = if basic_upper < self.upper || pc > self.upper {
                    basic_upper
                } else {
                    self.upper
                };
                self.lower = if basic_lower > self.lower || pc < self.lower {
                    basic_lower
                } else {
                    self.lower
                };
                match trend {
                    Trend::Down if bar.close > self.upper => Trend::Up,
                    Trend::Up if bar.close < self.lower => Trend::Down,
                    unchanged => unchanged,
                }
            }
            _ => {
                self.upper = basic_upper;
                self.lower = basic_lower;
                if bar.close < basic_lower {
                    Trend::Down
                } else {
                    Trend::Up
                }
            }
        };

        if self.upper < self.lower {
            self.upper = basic_upper;
            self.lower = basic_lower;
        }
        self.trend = Some(trend);

        SupertrendPoint {
            time: bar.time,
            upper: self.upper,
            lower: self.lower,
            line: match trend {
                Trend::Up => self.lower,
                Trend::Down => self.upper,
            },
            trend: Some(trend),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupertrendState {
    params: SupertrendParams,
    atr: AtrState,
    bands: BandState,
}

impl SupertrendState {
    pub fn new(params: SupertrendParams) -> Result<Self, PipelineError> {
        params.validate()?;
        Ok(Self {
            params,
            atr: AtrState::new(params.atr_period)?,
            bands: BandState::new(params.factor),
        })
    }

    pub fn params(&self) -> &SupertrendParams {
        &self.params
    }

    pub fn step(&mut self, bar: &Bar) -> SupertrendPoint {
        let atr = self.atr.step(bar);
        self.bands.step(bar, atr)
    }
}

/// Flip events from `(time, close, trend)` rows. The first defined trend is not a flip.
pub fn trend_flips(rows: impl IntoIterator<Item = (i64, f64, Option<Trend>)>) -> Vec<TrendSignal> {
    let mut prev: Option<Trend> = None;
    let mut signals = Vec::new();
    for (time, price, trend) in rows {
        let Some(trend) = trend else { continue };
        if prev.is_some_and(|p| p != trend) {
            signals.push(TrendSignal {
                time,
                price,
                direction: trend,
            });
        }
        prev = Some(trend);
    }
    signals
}

pub fn supertrend_signals(bars: &[Bar], points: &[SupertrendPoint]) -> Vec<TrendSignal> {
    trend_flips(bars.iter().zip(points).map(|(b, p)| (p.time, b.close, p.trend)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_bars::walk;

    fn run(bars: &[Bar], params: SupertrendParams) -> Vec<SupertrendPoint> {
        let mut state = SupertrendState::new(params).unwrap();
        bars.iter().map(|b| state.step(b)).collect()
    }

    #[test]
    fn test_upper_never_below_lower() {
        for seed in 1..6 {
            let bars = walk(400, seed);
            for factor in [0.0, 0.5, 1.0, 3.0] {
                let params = SupertrendParams {
                    atr_period: 10,
                    factor,
                };
                let out = run(&bars, params);
                for p in out.iter().skip(9) {
                    assert!(p.upper >= p.lower, "upper < lower at t={} (factor {})", p.time, factor);
                }
            }
        }
    }

    #[test]
    fn test_warm_up_until_atr_defined() {
        let out = run(&walk(30, 7), SupertrendParams::default());
        assert!(out[..9].iter().all(|p| p.upper.is_nan() && p.trend.is_none()));
        assert!(out[9].trend.is_some());
    }

    #[test]
    fn test_flips_on_crash_and_recovery() {
        let mut bars: Vec<Bar> = (0..20).map(|i| Bar::new(i * 60, 100.0, 101.0, 99.0, 100.0, 1.0)).collect();
        bars.extend((20..30).map(|i| Bar::new(i * 60, 80.0, 81.0, 79.0, 80.0, 1.0)));
        bars.extend((30..40).map(|i| Bar::new(i * 60, 120.0, 121.0, 119.0, 120.0, 1.0)));
        let params = SupertrendParams {
            atr_period: 5,
            factor: 1.0,
        };
        let out = run(&bars, params);
        let signals = supertrend_signals(&bars, &out);
        assert_eq!(signals.first().map(|s| s.direction), Some(Trend::Down));
        assert_eq!(signals.first().map(|s| s.time), Some(20 * 60));
        assert_eq!(signals.last().map(|s| s.direction), Some(Trend::Up));
    }

    #[test]
    fn test_rejects_negative_factor() {
        let params = SupertrendParams {
            atr_period: 10,
            factor: -1.0,
        };
        assert!(SupertrendState::new(params).is_err());
    }
}
