use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::INDICATORS;
use crate::domain::Bar;
use crate::error::PipelineError;
use crate::indicators::smoothing::{Smoother, Smoothing};
use crate::utils::maths_utils::EPS;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KdjParams {
    /// RSV look-back (N)
    pub period: usize,
    /// K smoothing (M)
    pub k_smooth: usize,
    /// D smoothing (L)
    pub d_smooth: usize,
    pub mode: Smoothing,
}

impl Default for KdjParams {
    fn default() -> Self {
        Self {
            period: INDICATORS.kdj.period,
            k_smooth: INDICATORS.kdj.k_smooth,
            d_smooth: INDICATORS.kdj.d_smooth,
            mode: Smoothing::Ema,
        }
    }
}

impl KdjParams {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.period == 0 || self.k_smooth == 0 || self.d_smooth == 0 {
            return Err(PipelineError::invalid(
                "kdj",
                format!(
                    "periods must be positive, got ({}, {}, {})",
                    self.period, self.k_smooth, self.d_smooth
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KdjPoint {
    pub time: i64,
    pub k: f64,
    pub d: f64,
    pub j: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KdjState {
    params: KdjParams,
    // (high, low) of the trailing window, partial at the start of the series
    range: VecDeque<(f64, f64)>,
    k: Smoother,
    d: Smoother,
}

impl KdjState {
    pub fn new(params: KdjParams) -> Result<Self, PipelineError> {
        params.validate()?;
        Ok(Self {
            params,
            range: VecDeque::with_capacity(params.period + 1),
            k: Smoother::new(params.mode, params.k_smooth),
            d: Smoother::new(params.mode, params.d_smooth),
        })
    }

    pub fn params(&self) -> &KdjParams {
        &self.params
    }

    pub fn step(&mut self, bar: &Bar) -> KdjPoint {
        self.range.push_back((bar.high, bar.low));
        if self.range.len() > self.params.period {
            self.range.pop_front();
        }
        let (hh, ll) = self
            .range
            .iter()
            .fold((f64::NEG_INFINITY, f64::INFINITY), |(hh, ll), &(h, l)| (hh.max(h), ll.min(l)));

        let rsv = 100.0 * (bar.close - ll) / (hh - ll).max(EPS);
        let k = self.k.step(rsv);
        let d = self.d.step(k);
        KdjPoint {
            time: bar.time,
            k,
            d,
            j: 3.0 * k - 2.0 * d,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let c = 100.0 + (i as f64 / 7.0).sin();
                Bar::new(i as i64 * 60, c, c + 2.0, c - 2.0, c, 1.0)
            })
            .collect()
    }

    #[test]
    fn test_j_identity_both_modes() {
        for mode in [Smoothing::Ema, Smoothing::Rma] {
            let mut state = KdjState::new(KdjParams {
                mode,
                ..Default::default()
            })
            .unwrap();
            for bar in sine_bars(80) {
                let p = state.step(&bar);
                assert!((p.j - (3.0 * p.k - 2.0 * p.d)).abs() < 1e-8, "J identity broken in {}", mode);
            }
        }
    }

    #[test]
    fn test_first_value_has_no_warm_up() {
        let mut state = KdjState::new(KdjParams::default()).unwrap();
        let p = state.step(&Bar::new(0, 10.0, 12.0, 8.0, 11.0, 1.0));
        // RSV = 100 * (11 - 8) / 4
        assert_eq!(p.k, 75.0);
        assert_eq!(p.d, 75.0);
        assert_eq!(p.j, 75.0);
    }

    #[test]
    fn test_rsv_window_is_trailing() {
        let params = KdjParams {
            period: 2,
            k_smooth: 1,
            d_smooth: 1,
            mode: Smoothing::Rma,
        };
        let mut state = KdjState::new(params).unwrap();
        state.step(&Bar::new(0, 50.0, 100.0, 0.0, 50.0, 0.0));
        state.step(&Bar::new(60, 10.0, 12.0, 8.0, 10.0, 0.0));
        // First bar has left the window: HH=14, LL=8
        let p = state.step(&Bar::new(120, 13.0, 14.0, 11.0, 11.0, 0.0));
        assert!((p.k - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_flat_range_uses_epsilon_floor() {
        let mut state = KdjState::new(KdjParams::default()).unwrap();
        let p = state.step(&Bar::flat(0, 10.0));
        assert_eq!(p.k, 0.0);
    }
}
