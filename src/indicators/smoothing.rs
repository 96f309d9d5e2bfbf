//! Recursive smoothers shared by the indicators. Each carries O(1) state so the
//! same step drives both a full recompute and a live patch.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::domain::Bar;
use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Smoothing {
    /// alpha = 2 / (p + 1)
    #[default]
    #[strum(serialize = "ema")]
    Ema,
    /// Wilder: prev + (x - prev) / p
    #[strum(serialize = "rma")]
    Rma,
}

/// EMA or RMA seeded with the first input (no warm-up gap).
#[derive(Debug, Clone, PartialEq)]
pub struct Smoother {
    mode: Smoothing,
    period: usize,
    value: Option<f64>,
}

impl Smoother {
    pub fn new(mode: Smoothing, period: usize) -> Self {
        Self {
            mode,
            period,
            value: None,
        }
    }

    pub fn step(&mut self, x: f64) -> f64 {
        let next = match self.value {
            None => x,
            Some(prev) => match self.mode {
                Smoothing::Ema => {
                    let alpha = 2.0 / (self.period as f64 + 1.0);
                    alpha * x + (1.0 - alpha) * prev
                }
                Smoothing::Rma => prev + (x - prev) / self.period as f64,
            },
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

/// Wilder ATR seeded with the simple mean of the first `period` true ranges.
///
/// Undefined (`None`) until `period` bars have been seen.
#[derive(Debug, Clone, PartialEq)]
pub struct AtrState {
    period: usize,
    prev_close: Option<f64>,
    seen: usize,
    seed_sum: f64,
    atr: Option<f64>,
}

impl AtrState {
    pub fn new(period: usize) -> Result<Self, PipelineError> {
        if period == 0 {
            return Err(PipelineError::invalid("atr", "period must be at least 1"));
        }
        Ok(Self {
            period,
            prev_close: None,
            seen: 0,
            seed_sum: 0.0,
            atr: None,
        })
    }

    pub fn true_range(bar: &Bar, prev_close: Option<f64>) -> f64 {
        let range = bar.high - bar.low;
        match prev_close {
            Some(pc) => range.max((bar.high - pc).abs()).max((bar.low - pc).abs()),
            None => range,
        }
    }

    pub fn step(&mut self, bar: &Bar) -> Option<f64> {
        let tr = Self::true_range(bar, self.prev_close);
        self.prev_close = Some(bar.close);
        self.seen += 1;

        let p = self.period as f64;
        self.atr = match self.atr {
            Some(prev) => Some((prev * (p - 1.0) + tr) / p),
            None => {
                self.seed_sum += tr;
                (self.seen >= self.period).then(|| self.seed_sum / p)
            }
        };
        self.atr
    }

    pub fn value(&self) -> Option<f64> {
        self.atr
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

/// EMA rate for a performance memory setting: values above 1 are a span.
pub fn perf_alpha_rate(perf_alpha: f64) -> f64 {
    if perf_alpha > 1.0 {
        2.0 / (perf_alpha + 1.0)
    } else {
        perf_alpha.clamp(0.001, 0.999)
    }
}
