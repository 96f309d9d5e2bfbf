use std::collections::HashMap;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::decimate::{OhlcOptions, VisibleRange};
use crate::domain::{Bar, Series};
use crate::error::PipelineError;

use super::messages::{JobRequest, JobResult, TransportEvent};
use super::render::{RenderOp, RenderTarget, coalesce_updates};
use super::state::{PaneState, Subscription, VisibleView};
use super::worker;

/// Render operations addressed to one pane
pub type PaneOps = (String, Vec<RenderOp>);

pub struct ChartEngine {
    /// Registry of all panes, keyed by pane id
    panes: HashMap<String, PaneState>,

    /// Monotonic across all panes so a resubscribed pane never reuses a generation
    next_generation: u64,

    /// Worker Communication
    job_tx: Sender<JobRequest>,
    result_rx: Receiver<JobResult>,
    worker: Option<JoinHandle<()>>,

    pub ohlc_options: OhlcOptions,
}

impl Default for ChartEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartEngine {
    /// Initialize the engine and spawn its worker.
    pub fn new() -> Self {
        let (job_tx, job_rx) = channel::<JobRequest>();
        let (result_tx, result_rx) = channel::<JobResult>();
        let worker = worker::spawn_worker_thread(job_rx, result_tx);

        Self {
            panes: HashMap::new(),
            next_generation: 1,
            job_tx,
            result_rx,
            worker: Some(worker),
            ohlc_options: OhlcOptions::default(),
        }
    }

    /// Point `pane_id` at a new subscription, replacing whatever it showed before.
    ///
    /// The old session (aggregator, indicator states, pending work) is dropped in one
    /// step; a worker result still in flight for it will be discarded. Returns the
    /// initial candle data for the pane.
    pub fn subscribe(
        &mut self,
        pane_id: &str,
        subscription: Subscription,
        history: Vec<Bar>,
    ) -> Result<Vec<RenderOp>, PipelineError> {
        let generation = self.next_generation;
        let mut state = PaneState::new(subscription, generation, history)?;
        self.next_generation += 1;

        let initial = vec![RenderOp::SetData {
            target: RenderTarget::Candles,
            series: Series::Candles(state.bars().to_vec()),
        }];

        if state.subscription.indicators.is_empty() {
            log::info!("[{}] Subscribed {} (no indicators)", pane_id, state.subscription.label());
        } else {
            let req = state.job_request(pane_id);
            log::info!(
                "[{}] Subscribed {} gen {} ({} bars, {} indicators queued)",
                pane_id,
                state.subscription.label(),
                generation,
                req.bars.len(),
                req.indicators.len()
            );
            if self.job_tx.send(req).is_err() {
                log::error!("[{}] Worker is gone, indicators will not be computed", pane_id);
                state.fail("worker unavailable".to_string());
            }
        }

        if let Some(previous) = self.panes.insert(pane_id.to_string(), state) {
            log::debug!(
                "[{}] Replaced {} gen {}",
                pane_id,
                previous.subscription.label(),
                previous.generation
            );
        }
        Ok(initial)
    }

    pub fn unsubscribe(&mut self, pane_id: &str) -> bool {
        let removed = self.panes.remove(pane_id).is_some();
        if removed {
            log::info!("[{}] Unsubscribed", pane_id);
        }
        removed
    }

    /// Route one transport event to a pane. Unknown panes are ignored.
    pub fn handle_event(&mut self, pane_id: &str, event: TransportEvent) -> Vec<RenderOp> {
        match self.panes.get_mut(pane_id) {
            Some(state) => state.handle_event(event),
            None => {
                log::debug!("Event for unknown pane {}", pane_id);
                Vec::new()
            }
        }
    }

    /// Fold a batch of events. Panes are independent, so each pane's events are folded
    /// on its own rayon task; order within a pane is preserved and its ops are coalesced.
    pub fn handle_batch(&mut self, events: Vec<(String, TransportEvent)>) -> Vec<PaneOps> {
        let mut by_pane: HashMap<String, Vec<TransportEvent>> = HashMap::new();
        for (pane_id, event) in events {
            by_pane.entry(pane_id).or_default().push(event);
        }

        let mut out: Vec<PaneOps> = self
            .panes
            .par_iter_mut()
            .filter_map(|(pane_id, state)| {
                let events = by_pane.get(pane_id)?;
                let ops: Vec<RenderOp> = events
                    .iter()
                    .cloned()
                    .flat_map(|event| state.handle_event(event))
                    .collect();
                Some((pane_id.clone(), coalesce_updates(ops)))
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// THE GAME LOOP.
    /// Drains finished worker jobs and returns the resulting ops. Non-blocking.
    pub fn update(&mut self) -> Vec<PaneOps> {
        let mut out = Vec::new();
        while let Ok(result) = self.result_rx.try_recv() {
            out.extend(self.handle_job_result(result));
        }
        out
    }

    /// Block until no pane is calculating or `timeout` passes.
    pub fn wait_idle(&mut self, timeout: Duration) -> Vec<PaneOps> {
        let deadline = Instant::now() + timeout;
        let mut out = self.update();
        while self.is_busy() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.result_rx.recv_timeout(remaining) {
                Ok(result) => out.extend(self.handle_job_result(result)),
                Err(RecvTimeoutError::Timeout) => {
                    log::warn!("Timed out waiting for worker after {:?}", timeout);
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    log::error!("Worker channel closed");
                    break;
                }
            }
        }
        out
    }

    fn handle_job_result(&mut self, result: JobResult) -> Option<PaneOps> {
        let Some(state) = self.panes.get_mut(&result.pane_id) else {
            log::debug!("Dropping result for removed pane {}", result.pane_id);
            return None;
        };
        if state.generation != result.generation {
            log::debug!(
                "[{}] Dropping stale result gen {} (current gen {})",
                result.pane_id,
                result.generation,
                state.generation
            );
            return None;
        }
        match result.result {
            Ok(computed) => {
                log::info!(
                    "[{}] Indicators ready in {} ms",
                    result.pane_id,
                    result.duration_ms
                );
                Some((result.pane_id, state.accept_result(computed)))
            }
            Err(e) => {
                log::error!("Worker failed for {}: {}", result.pane_id, e);
                state.fail(e);
                None
            }
        }
    }

    // --- ACCESSORS ---

    pub fn pane(&self, pane_id: &str) -> Option<&PaneState> {
        self.panes.get(pane_id)
    }

    pub fn pane_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.panes.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_busy(&self) -> bool {
        self.panes.values().any(|s| s.is_calculating)
    }

    /// Decimated candles and indicator lines of a pane for `range`.
    pub fn visible_view(&self, pane_id: &str, range: VisibleRange, pixel_width: f64) -> Option<VisibleView> {
        self.panes
            .get(pane_id)
            .map(|state| state.visible_view(range, pixel_width, &self.ohlc_options))
    }
}

impl Drop for ChartEngine {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop
        let (dead_tx, _) = channel::<JobRequest>();
        drop(std::mem::replace(&mut self.job_tx, dead_tx));
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("Worker thread panicked");
            }
        }
    }
}
