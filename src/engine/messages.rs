use std::sync::Arc;

use crate::domain::{Bar, Tick};
use crate::indicators::{IndicatorParams, IndicatorSeries, IndicatorState};

/// A request to run the full indicator computation for one pane
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub pane_id: String,
    /// Session generation the request was issued for
    pub generation: u64,
    // Snapshot of the pane's bars at dispatch time
    pub bars: Arc<Vec<Bar>>,
    pub indicators: Vec<IndicatorParams>,
}

/// One indicator's full series and the state positioned after its last bar
#[derive(Debug, Clone)]
pub struct ComputedIndicator {
    pub series: IndicatorSeries,
    pub state: IndicatorState,
}

/// The result returned by the worker
#[derive(Debug, Clone)]
pub struct JobResult {
    pub pane_id: String,
    pub generation: u64,
    pub duration_ms: u128,

    // Success: one entry per requested indicator, in request order
    // Failure: the error string
    pub result: Result<Vec<ComputedIndicator>, String>,
}

/// What a live transport delivers to a subscription
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Tick(Tick),
    Disconnected,
    Reconnected,
}
