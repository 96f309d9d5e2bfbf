use std::time::Instant;

use serde::Serialize;

use crate::data::{AggregatorStats, BarUpdate, StreamAggregator, UpdateKind};
use crate::decimate::{OhlcOptions, VisibleRange, decimate_ohlc_visible, lttb};
use crate::domain::{Bar, LinePoint, Point, Series, Timeframe};
use crate::error::PipelineError;
use crate::indicators::{IndicatorParams, IndicatorPoint};

use super::messages::{ComputedIndicator, JobRequest, TransportEvent};
use super::render::{RenderOp, RenderTarget};

/// What a pane is showing: one symbol at one timeframe, plus its indicators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub indicators: Vec<IndicatorParams>,
}

impl Subscription {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, indicators: Vec<IndicatorParams>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            indicators,
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        self.indicators.iter().try_for_each(|p| p.validate())
    }

    pub fn label(&self) -> String {
        format!("{}@{}", self.symbol, self.timeframe)
    }
}

/// Decimated candles and indicator lines for one visible range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisibleView {
    pub range: VisibleRange,
    pub candles: Vec<Bar>,
    pub lines: Vec<(RenderTarget, Vec<LinePoint>)>,
}

/// Everything one pane owns. Replaced wholesale on resubscribe.
#[derive(Debug)]
pub struct PaneState {
    pub subscription: Subscription,
    /// Bumped on every subscribe; worker results for another generation are stale
    pub generation: u64,

    aggregator: StreamAggregator,
    bars: Vec<Bar>,

    /// Empty until the worker's first result lands
    computed: Vec<ComputedIndicator>,
    /// Bars emitted while the worker was busy, replayed through its states
    replay: Vec<Bar>,

    pub is_calculating: bool,
    pub is_connected: bool,
    pub last_error: Option<String>,
    pub last_update_time: Instant,
}

impl PaneState {
    pub fn new(subscription: Subscription, generation: u64, history: Vec<Bar>) -> Result<Self, PipelineError> {
        subscription.validate()?;
        let mut aggregator = StreamAggregator::new(subscription.label(), subscription.timeframe);
        if let Some(last) = history.last() {
            aggregator.prime(*last);
        }
        Ok(Self {
            subscription,
            generation,
            aggregator,
            bars: history,
            computed: Vec::new(),
            replay: Vec::new(),
            is_calculating: false,
            is_connected: true,
            last_error: None,
            last_update_time: Instant::now(),
        })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn computed(&self) -> &[ComputedIndicator] {
        &self.computed
    }

    pub fn stats(&self) -> AggregatorStats {
        self.aggregator.stats()
    }

    /// Snapshot the bars for a full computation and start buffering live bars.
    pub fn job_request(&mut self, pane_id: &str) -> JobRequest {
        self.is_calculating = true;
        self.replay.clear();
        JobRequest {
            pane_id: pane_id.to_string(),
            generation: self.generation,
            bars: self.bars.clone().into(),
            indicators: self.subscription.indicators.clone(),
        }
    }

    /// Route one transport event through the aggregator and indicator states.
    pub fn handle_event(&mut self, event: TransportEvent) -> Vec<RenderOp> {
        match event {
            TransportEvent::Tick(tick) => {
                let updates = self.aggregator.handle_tick(&tick);
                updates.into_iter().flat_map(|u| self.apply_update(u)).collect()
            }
            TransportEvent::Disconnected => {
                log::warn!("[{}] Transport disconnected", self.subscription.label());
                self.is_connected = false;
                Vec::new()
            }
            TransportEvent::Reconnected => {
                log::info!("[{}] Transport reconnected", self.subscription.label());
                self.is_connected = true;
                Vec::new()
            }
        }
    }

    fn apply_update(&mut self, update: BarUpdate) -> Vec<RenderOp> {
        let BarUpdate { bar, kind } = update;
        let replaces_last = kind == UpdateKind::Replace && self.bars.last().is_some_and(|b| b.time == bar.time);
        if replaces_last {
            let last = self.bars.len() - 1;
            self.bars[last] = bar;
        } else {
            self.bars.push(bar);
        }
        self.last_update_time = Instant::now();

        let mut ops = vec![RenderOp::Update {
            target: RenderTarget::Candles,
            point: Point::Candle(bar),
            kind,
        }];
        if self.is_calculating {
            self.replay.push(bar);
        } else {
            for computed in &mut self.computed {
                if let Some(point) = patch_computed(computed, &bar) {
                    ops.extend(line_updates(&point, kind));
                }
            }
        }
        ops
    }

    /// Swap in a finished computation, catching it up with bars that arrived meanwhile.
    pub fn accept_result(&mut self, mut computed: Vec<ComputedIndicator>) -> Vec<RenderOp> {
        for bar in self.replay.drain(..) {
            for c in &mut computed {
                patch_computed(c, &bar);
            }
        }
        self.computed = computed;
        self.is_calculating = false;
        self.last_error = None;

        self.computed
            .iter()
            .flat_map(|c| {
                let indicator = c.series.kind;
                c.series.lines().into_iter().map(move |(name, points)| RenderOp::SetData {
                    target: RenderTarget::Line { indicator, name },
                    series: Series::Line(points),
                })
            })
            .collect()
    }

    /// Keep the previous computation, caught up with the bars buffered for the failed job.
    pub fn fail(&mut self, error: String) {
        for bar in self.replay.drain(..) {
            for c in &mut self.computed {
                patch_computed(c, &bar);
            }
        }
        self.is_calculating = false;
        self.last_error = Some(error);
    }

    /// Candles and indicator lines for `range`, decimated to what `pixel_width` can show.
    pub fn visible_view(&self, range: VisibleRange, pixel_width: f64, options: &OhlcOptions) -> VisibleView {
        let budget = options.point_budget(pixel_width);
        let candles = decimate_ohlc_visible(&self.bars, range, pixel_width, options);
        let lines = self
            .computed
            .iter()
            .flat_map(|c| {
                let indicator = c.series.kind;
                c.series.lines().into_iter().map(move |(name, points)| {
                    let start = points.partition_point(|p| p.time < range.from);
                    let end = points.partition_point(|p| p.time <= range.to).max(start);
                    (RenderTarget::Line { indicator, name }, lttb(&points[start..end], budget))
                })
            })
            .collect();
        VisibleView { range, candles, lines }
    }
}

/// Patch the state and keep the stored series in step with it.
fn patch_computed(computed: &mut ComputedIndicator, bar: &Bar) -> Option<IndicatorPoint> {
    let point = computed.state.patch(bar)?;
    let points = &mut computed.series.points;
    if points.last().is_some_and(|last| last.time() == point.time()) {
        let last = points.len() - 1;
        points[last] = point;
    } else {
        points.push(point);
    }
    Some(point)
}

fn line_updates(point: &IndicatorPoint, kind: UpdateKind) -> Vec<RenderOp> {
    let indicator = point.kind();
    point
        .line_values()
        .into_iter()
        .filter(|(_, value)| value.is_finite())
        .map(|(name, value)| RenderOp::Update {
            target: RenderTarget::Line { indicator, name },
            point: Point::Line(LinePoint::new(point.time(), value)),
            kind,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Tick;
    use crate::indicators::IndicatorKind;
    use crate::indicators::test_bars::walk;
    use crate::engine::worker::run_job;

    fn compute(req: &JobRequest) -> Vec<ComputedIndicator> {
        run_job(req).unwrap()
    }

    fn pane(history: Vec<Bar>) -> PaneState {
        let sub = Subscription::new(
            "SPY",
            Timeframe::Min1,
            vec![IndicatorParams::default_for(IndicatorKind::Bollinger)],
        );
        PaneState::new(sub, 1, history).unwrap()
    }

    #[test]
    fn test_ticks_before_first_result_are_replayed() {
        let history = walk(60, 4);
        let mut state = pane(history);
        let req = state.job_request("main");

        // Two ticks land while the worker is busy: a replace of the open bar, then a new bucket
        let ops_a = state.handle_event(TransportEvent::Tick(Tick::from_price(59 * 60 + 10_i64, 150.0)));
        let ops_b = state.handle_event(TransportEvent::Tick(Tick::from_price(60 * 60 + 5_i64, 151.0)));
        assert_eq!(ops_a.len(), 1, "only the candle is updated while calculating");
        assert_eq!(ops_b.len(), 1);

        let set_data = state.accept_result(compute(&req));
        assert_eq!(set_data.len(), 3, "mid, upper and lower lines");

        // Caught-up state matches a full compute over the current bars
        let fresh = compute(&JobRequest {
            bars: state.bars().to_vec().into(),
            ..req
        });
        assert_eq!(state.computed()[0].series, fresh[0].series);
        assert_eq!(state.computed()[0].state, fresh[0].state);
    }

    #[test]
    fn test_live_tick_patches_lines() {
        let mut state = pane(walk(60, 4));
        let req = state.job_request("main");
        state.accept_result(compute(&req));

        let ops = state.handle_event(TransportEvent::Tick(Tick::from_price(60 * 60_i64, 99.0)));
        // One filler-free append: candle plus three band lines
        assert_eq!(ops.len(), 4);
        assert!(ops.iter().all(|op| matches!(op, RenderOp::Update { kind: UpdateKind::Append, .. })));
        assert_eq!(state.bars().len(), 61);
        assert_eq!(state.computed()[0].series.len(), 61);
    }

    #[test]
    fn test_failed_job_keeps_lines_in_step_with_bars() {
        let mut state = pane(walk(60, 4));
        let first = state.job_request("main");
        state.accept_result(compute(&first));

        // A recompute starts, bars arrive, then the job fails
        let second = state.job_request("main");
        state.handle_event(TransportEvent::Tick(Tick::from_price(60 * 60_i64, 98.0)));
        state.handle_event(TransportEvent::Tick(Tick::from_price(61 * 60_i64, 97.0)));
        state.fail("worker gave up".to_string());
        assert!(!state.is_calculating);
        assert_eq!(state.last_error.as_deref(), Some("worker gave up"));

        let fresh = compute(&JobRequest {
            bars: state.bars().to_vec().into(),
            ..second
        });
        assert_eq!(state.computed()[0].series, fresh[0].series);
        assert_eq!(state.computed()[0].state, fresh[0].state);

        let ops = state.handle_event(TransportEvent::Tick(Tick::from_price(62 * 60_i64, 96.0)));
        assert_eq!(ops.len(), 4, "candle plus three band lines");
        assert_eq!(state.computed()[0].series.len(), state.bars().len());
    }

    #[test]
    fn test_disconnect_leaves_bars_untouched() {
        let mut state = pane(walk(10, 1));
        assert!(state.handle_event(TransportEvent::Disconnected).is_empty());
        assert!(!state.is_connected);
        assert!(state.handle_event(TransportEvent::Reconnected).is_empty());
        assert!(state.is_connected);
        assert_eq!(state.bars().len(), 10);
    }

    #[test]
    fn test_invalid_indicator_rejected() {
        let mut params = crate::indicators::BollingerParams::default();
        params.period = 1;
        let sub = Subscription::new("SPY", Timeframe::Min1, vec![IndicatorParams::Bollinger(params)]);
        assert!(PaneState::new(sub, 1, Vec::new()).is_err());
    }
}
