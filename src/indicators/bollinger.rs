use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::config::INDICATORS;
use crate::domain::Bar;
use crate::error::PipelineError;
use crate::utils::maths_utils::EPS;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerParams {
    pub period: usize,
    pub multiplier: f64,
}

impl Default for BollingerParams {
    fn default() -> Self {
        Self {
            period: INDICATORS.bollinger.period,
            multiplier: INDICATORS.bollinger.multiplier,
        }
    }
}

impl BollingerParams {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.period < 2 {
            return Err(PipelineError::invalid("bollinger", "period must be at least 2"));
        }
        if !self.multiplier.is_finite() || self.multiplier < 0.0 {
            return Err(PipelineError::invalid(
                "bollinger",
                format!("multiplier must be finite and non-negative, got {}", self.multiplier),
            ));
        }
        Ok(())
    }
}

/// One Bollinger output row. All values are NaN during warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BollingerPoint {
    pub time: i64,
    pub mid: f64,
    pub upper: f64,
    pub lower: f64,
    pub pct_b: f64,
    pub bandwidth: f64,
}

impl BollingerPoint {
    fn warming_up(time: i64) -> Self {
        Self {
            time,
            mid: f64::NAN,
            upper: f64::NAN,
            lower: f64::NAN,
            pct_b: f64::NAN,
            bandwidth: f64::NAN,
        }
    }
}

/// Trailing window of closes.
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerState {
    params: BollingerParams,
    window: VecDeque<f64>,
}

impl BollingerState {
    pub fn new(params: BollingerParams) -> Result<Self, PipelineError> {
        params.validate()?;
        Ok(Self {
            params,
            window: VecDeque::with_capacity(params.period + 1),
        })
    }

    pub fn params(&self) -> &BollingerParams {
        &self.params
    }

    pub fn step(&mut self, bar: &Bar) -> BollingerPoint {
        self.window.push_back(bar.close);
        if self.window.len() > self.params.period {
            self.window.pop_front();
        }
        if self.window.len() < self.params.period {
            return BollingerPoint::warming_up(bar.time);
        }

        let mid = self.window.iter().mean();
        let sigma = self.window.iter().population_std_dev();
        let half_width = self.params.multiplier * sigma;
        let upper = mid + half_width;
        let lower = mid - half_width;

        BollingerPoint {
            time: bar.time,
            mid,
            upper,
            lower,
            pct_b: (bar.close - lower) / (upper - lower).max(EPS),
            bandwidth: (upper - lower) / mid.abs().max(EPS),
        }
    }
}
