use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;

#[cfg(debug_assertions)]
use crate::config::debug::PRINT_WORKER_TIMINGS;
use crate::error::PipelineError;
use crate::indicators::compute_indicator_with_state;

use super::messages::{ComputedIndicator, JobRequest, JobResult};

/// Full-history computation for one request. Pure: no engine state involved.
pub fn run_job(req: &JobRequest) -> Result<Vec<ComputedIndicator>, PipelineError> {
    req.indicators
        .iter()
        .map(|params| {
            compute_indicator_with_state(params, &req.bars)
                .map(|(series, state)| ComputedIndicator { series, state })
        })
        .collect()
}

/// Single background worker. Exits when either channel end is dropped.
pub fn spawn_worker_thread(rx: Receiver<JobRequest>, tx: Sender<JobResult>) -> JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(req) = rx.recv() {
            let start = Instant::now();
            let result = run_job(&req).map_err(|e| e.to_string());
            let elapsed = start.elapsed().as_millis();

            #[cfg(debug_assertions)]
            if PRINT_WORKER_TIMINGS {
                log::info!(
                    "Worker: pane {} gen {} ({} bars, {} indicators) in {} ms",
                    req.pane_id,
                    req.generation,
                    req.bars.len(),
                    req.indicators.len(),
                    elapsed
                );
            }

            let sent = tx.send(JobResult {
                pane_id: req.pane_id,
                generation: req.generation,
                duration_ms: elapsed,
                result,
            });
            if sent.is_err() {
                // Engine dropped; nobody is listening anymore
                break;
            }
        }
        log::debug!("Worker thread exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_bars::walk;
    use crate::indicators::{IndicatorKind, IndicatorParams};
    use std::sync::Arc;
    use std::sync::mpsc::channel;

    #[test]
    fn test_worker_round_trip() {
        let (job_tx, job_rx) = channel::<JobRequest>();
        let (result_tx, result_rx) = channel::<JobResult>();
        let handle = spawn_worker_thread(job_rx, result_tx);

        job_tx
            .send(JobRequest {
                pane_id: "main".to_string(),
                generation: 7,
                bars: Arc::new(walk(100, 2)),
                indicators: vec![
                    IndicatorParams::default_for(IndicatorKind::Bollinger),
                    IndicatorParams::default_for(IndicatorKind::Kdj),
                ],
            })
            .unwrap();

        let result = result_rx.recv().unwrap();
        assert_eq!(result.pane_id, "main");
        assert_eq!(result.generation, 7);
        let computed = result.result.unwrap();
        assert_eq!(computed.len(), 2);
        assert_eq!(computed[0].series.kind, IndicatorKind::Bollinger);
        assert_eq!(computed[1].series.len(), 100);
        assert_eq!(computed[1].state.open_time(), Some(99 * 60));

        drop(job_tx);
        handle.join().unwrap();
    }
}
