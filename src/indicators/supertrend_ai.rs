//! Adaptive Supertrend: one band per factor on a grid, ranked by a running
//! performance score and clustered every bar to choose the factor to display.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::config::INDICATORS;
use crate::domain::Bar;
use crate::error::PipelineError;
use crate::indicators::kmeans::{Cluster, MAX_K, Partition, partition};
use crate::indicators::smoothing::{AtrState, perf_alpha_rate};
use crate::indicators::supertrend::{
    BandState, SupertrendPoint, Trend, TrendSignal, trend_flips, validate_factor,
};
use crate::utils::maths_utils::EPS;

/// Upper bound on the factor grid size, keeps a patch step cheap.
pub const MAX_GRID_SIZE: usize = 256;

/// Bounds of the adaptive smoothing rate.
const AMA_RATE_MIN: f64 = 0.02;
const AMA_RATE_MAX: f64 = 0.9;

/// Which cluster the displayed factor is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ClusterPick {
    /// TOP cluster, highest performance
    #[default]
    Best,
    /// AVG cluster, performance closest to the cluster mean
    Average,
    /// LOW cluster, lowest performance
    Worst,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupertrendAiParams {
    pub atr_period: usize,
    pub factor_min: f64,
    pub factor_max: f64,
    pub factor_step: f64,
    /// EMA rate of the performance memory; values above 1 are a span
    pub perf_alpha: f64,
    pub pick: ClusterPick,
    /// Number of performance clusters, 2 or 3
    pub k: usize,
    pub max_iterations: usize,
    /// Also emit an adaptive moving average of the selected band
    pub use_ama: bool,
    /// EMA setting of the |close change| normalizer, read like `perf_alpha`
    pub denom_span: f64,
}

impl Default for SupertrendAiParams {
    fn default() -> Self {
        let d = &INDICATORS.supertrend_ai;
        Self {
            atr_period: d.atr_period,
            factor_min: d.factor_min,
            factor_max: d.factor_max,
            factor_step: d.factor_step,
            perf_alpha: d.perf_alpha,
            pick: ClusterPick::Best,
            k: d.clusters,
            max_iterations: d.max_kmeans_iterations,
            use_ama: d.use_ama,
            denom_span: d.denom_span,
        }
    }
}

impl SupertrendAiParams {
    pub fn validate(&self) -> Result<(), PipelineError> {
        const NAME: &str = "supertrend_ai";
        if self.atr_period == 0 {
            return Err(PipelineError::invalid(NAME, "atr_period must be at least 1"));
        }
        validate_factor(NAME, self.factor_min)?;
        validate_factor(NAME, self.factor_max)?;
        if self.factor_max < self.factor_min {
            return Err(PipelineError::invalid(
                NAME,
                format!("factor_max {} is below factor_min {}", self.factor_max, self.factor_min),
            ));
        }
        if !(self.factor_step.is_finite() && self.factor_step > 0.0) {
            return Err(PipelineError::invalid(NAME, "factor_step must be positive"));
        }
        if !(self.perf_alpha.is_finite() && self.perf_alpha > 0.0) {
            return Err(PipelineError::invalid(NAME, "perf_alpha must be positive"));
        }
        if !(2..=MAX_K).contains(&self.k) {
            return Err(PipelineError::invalid(NAME, format!("k must be 2 or 3, got {}", self.k)));
        }
        if !(self.denom_span.is_finite() && self.denom_span > 0.0) {
            return Err(PipelineError::invalid(NAME, "denom_span must be positive"));
        }
        let size = self.grid_size();
        if size > MAX_GRID_SIZE {
            return Err(PipelineError::invalid(
                NAME,
                format!("factor grid has {} entries, limit is {}", size, MAX_GRID_SIZE),
            ));
        }
        Ok(())
    }

    fn grid_size(&self) -> usize {
        ((self.factor_max - self.factor_min) / self.factor_step + 1e-9).floor() as usize + 1
    }

    /// `factor_min, factor_min + step, ..` up to and including `factor_max`.
    pub fn factors(&self) -> Vec<f64> {
        (0..self.grid_size())
            .map(|i| {
                let f = self.factor_min + i as f64 * self.factor_step;
                (f * 1e6).round() / 1e6
            })
            .collect()
    }
}

/// One entry of the factor grid.
#[derive(Debug, Clone, PartialEq)]
struct FactorSlot {
    bands: BandState,
    perf: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SupertrendAiPoint {
    pub time: i64,
    /// Active band of the selected factor
    pub band: f64,
    pub upper: f64,
    pub lower: f64,
    pub trend: Option<Trend>,
    pub factor: f64,
    pub perf: f64,
    pub cluster: Option<Cluster>,
    /// `None` unless smoothing is enabled; NaN while warming up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ama: Option<f64>,
}

impl SupertrendAiPoint {
    fn warming_up(time: i64, use_ama: bool) -> Self {
        Self {
            time,
            band: f64::NAN,
            upper: f64::NAN,
            lower: f64::NAN,
            trend: None,
            factor: f64::NAN,
            perf: f64::NAN,
            cluster: None,
            ama: use_ama.then_some(f64::NAN),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupertrendAiState {
    params: SupertrendAiParams,
    alpha: f64,
    atr: AtrState,
    grid: Vec<FactorSlot>,
    prev_close: Option<f64>,
    denom_alpha: f64,
    /// EMA of |close - previous close|
    denom: Option<f64>,
    ama: Option<f64>,
}

impl SupertrendAiState {
    pub fn new(params: SupertrendAiParams) -> Result<Self, PipelineError> {
        params.validate()?;
        let grid = params
            .factors()
            .into_iter()
            .map(|factor| FactorSlot {
                bands: BandState::new(factor),
                perf: 0.0,
            })
            .collect();
        Ok(Self {
            params,
            alpha: perf_alpha_rate(params.perf_alpha),
            atr: AtrState::new(params.atr_period)?,
            grid,
            prev_close: None,
            denom_alpha: perf_alpha_rate(params.denom_span),
            denom: None,
            ama: None,
        })
    }

    pub fn params(&self) -> &SupertrendAiParams {
        &self.params
    }

    /// Current (factor, performance) pairs of the grid.
    pub fn performance(&self) -> Vec<(f64, f64)> {
        self.grid.iter().map(|s| (s.bands.factor(), s.perf)).collect()
    }

    /// O(grid size) per bar.
    pub fn step(&mut self, bar: &Bar) -> SupertrendAiPoint {
        let atr = self.atr.step(bar);
        let prev_close = self.prev_close.replace(bar.close);
        if let Some(pc) = prev_close {
            let change = (bar.close - pc).abs();
            let alpha = self.denom_alpha;
            self.denom = Some(self.denom.map_or(change, |d| d + alpha * (change - d)));
        }

        let mut points: Vec<SupertrendPoint> = Vec::with_capacity(self.grid.len());
        for slot in &mut self.grid {
            // Reward the direction held into this bar
            if let (Some(trend), Some(pc)) = (slot.bands.trend(), prev_close) {
                let reward = trend.sign() * (bar.close - pc);
                slot.perf += self.alpha * (reward - slot.perf);
            }
            points.push(slot.bands.step(bar, atr));
        }

        if atr.is_none() {
            return SupertrendAiPoint::warming_up(bar.time, self.params.use_ama);
        }

        let perfs: Vec<f64> = self.grid.iter().map(|s| s.perf).collect();
        let partition = partition(&perfs, self.params.k, self.params.max_iterations);
        let (index, cluster) = select(&partition, &perfs, self.params.pick);
        let chosen = &points[index];
        let ama = self
            .params
            .use_ama
            .then(|| self.smooth(chosen.line, partition.mean_of(cluster)));

        SupertrendAiPoint {
            time: bar.time,
            band: chosen.line,
            upper: chosen.upper,
            lower: chosen.lower,
            trend: chosen.trend,
            factor: self.grid[index].bands.factor(),
            perf: perfs[index],
            cluster: Some(cluster),
            ama,
        }
    }

    /// Move the AMA toward `band` at a rate set by how well the chosen cluster performs
    /// relative to typical price movement.
    fn smooth(&mut self, band: f64, cluster_mean: Option<f64>) -> f64 {
        let rate = match self.denom {
            Some(d) => (cluster_mean.unwrap_or(0.0).max(0.0) / (d + EPS)).clamp(AMA_RATE_MIN, AMA_RATE_MAX),
            None => AMA_RATE_MAX,
        };
        let next = match self.ama {
            Some(prev) => prev + rate * (band - prev),
            None => band,
        };
        self.ama = Some(next);
        next
    }
}

/// Grid index and cluster of the factor to display. Ties go to the lowest factor.
fn select(partition: &Partition, perfs: &[f64], pick: ClusterPick) -> (usize, Cluster) {
    let wanted = match pick {
        ClusterPick::Best => Cluster::Top,
        ClusterPick::Average => Cluster::Avg,
        ClusterPick::Worst => Cluster::Low,
    };
    // Fewer than three groups: fall back to TOP, which always exists
    let cluster = if partition.mean_of(wanted).is_some() {
        wanted
    } else {
        Cluster::Top
    };

    let score = |i: usize| -> f64 {
        match pick {
            ClusterPick::Best => -perfs[i],
            ClusterPick::Worst => perfs[i],
            ClusterPick::Average => {
                let mean = partition.mean_of(cluster).unwrap_or(perfs[i]);
                (perfs[i] - mean).abs()
            }
        }
    };

    // Members come out in ascending grid order, so strict `<` keeps the lowest factor
    let mut best: Option<(usize, f64)> = None;
    for i in partition.members(cluster) {
        let s = score(i);
        if best.is_none_or(|(_, b)| s < b) {
            best = Some((i, s));
        }
    }
    (best.map_or(0, |(i, _)| i), cluster)
}

pub fn supertrend_ai_signals(bars: &[Bar], points: &[SupertrendAiPoint]) -> Vec<TrendSignal> {
    trend_flips(bars.iter().zip(points).map(|(b, p)| (p.time, b.close, p.trend)))
}
