#![allow(clippy::collapsible_if)]
#![allow(clippy::type_complexity)]

// Core modules
pub mod config;
pub mod data;
pub mod decimate;
pub mod domain;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod utils;

// Re-export commonly used types
pub use data::{BucketClock, StreamAggregator, bucket_length_sec, bucket_start, normalize};
pub use decimate::{VisibleRange, decimate, lttb};
pub use domain::{Bar, LinePoint, RawBar, Series, Tick, Timeframe};
pub use engine::{ChartEngine, RenderOp, Subscription, TransportEvent};
pub use error::PipelineError;
pub use indicators::{compute_indicator, patch_indicator};

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::{DECIMATION, SESSION};
use crate::data::{AggregatorStats, HistoricalBars, HistoryRequest, JsonFileProvider, SeriesReport, validate_series};
use crate::decimate::{OhlcOptions, decimate_ohlc, decimate_ohlc_focus, visible_slice};
use crate::indicators::{IndicatorKind, IndicatorParams, IndicatorPoint, TrendSignal};

// CLI argument parsing
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON history file: an array of bars, or {"symbol": .., "bars": [..]}
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, default_value = "SPY")]
    pub symbol: String,

    /// 1m, 5m, 10m, 15m, 1h, 4h, 1d or 1w (1Min, 4Hour and the like also work)
    #[arg(long, default_value = "1m")]
    pub timeframe: Timeframe,

    /// bollinger (bb), kdj, supertrend (st) or supertrend_ai (stai); repeatable
    #[arg(long = "indicator")]
    pub indicators: Vec<IndicatorKind>,

    /// Point budget for the decimated output
    #[arg(long, default_value_t = DECIMATION.default_line_budget)]
    pub budget: usize,

    #[arg(long)]
    pub visible_from: Option<i64>,

    #[arg(long)]
    pub visible_to: Option<i64>,

    /// Decimate the whole series, spending most of the budget on the visible range
    #[arg(long, default_value_t = false)]
    pub focus: bool,

    /// Never let a decimated candle span the session close
    #[arg(long, default_value_t = false)]
    pub session_guard: bool,

    /// JSON array of ticks replayed through the live path after the history loads
    #[arg(long)]
    pub ticks: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub pretty: bool,
}

/// Everything loaded from disk before the pipeline runs
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub bars: Vec<Bar>,
    pub source: &'static str,
    pub ticks: Vec<Tick>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorSummary {
    pub kind: IndicatorKind,
    pub points: usize,
    pub last: Option<IndicatorPoint>,
    pub signals: Vec<TrendSignal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub source: &'static str,
    pub bars: usize,
    pub validation: SeriesReport,
    pub stream: Option<AggregatorStats>,
    pub indicators: Vec<IndicatorSummary>,
    pub range: Option<VisibleRange>,
    pub candles: Series,
    pub lines: Vec<(String, Series)>,
}

/// Load history (and optional ticks) from disk.
pub async fn load_data(args: &Cli) -> Result<LoadedData> {
    let providers: Vec<Box<dyn HistoricalBars>> = vec![Box::new(JsonFileProvider::new(&args.input))];
    let request = HistoryRequest::new(&args.symbol, args.timeframe);
    let (bars, source) = data::load_history(&providers, &request).await?;

    let ticks = match &args.ticks {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read ticks from {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("Failed to parse ticks in {}", path.display()))?
        }
        None => Vec::new(),
    };
    Ok(LoadedData { bars, source, ticks })
}

/// Run loaded data through the engine: indicators, live ticks, then decimation.
pub fn run_pipeline(args: &Cli, loaded: LoadedData) -> Result<RunSummary> {
    const PANE: &str = "main";
    let params: Vec<IndicatorParams> = args.indicators.iter().map(|k| IndicatorParams::default_for(*k)).collect();
    let subscription = Subscription::new(&args.symbol, args.timeframe, params);

    let mut engine = ChartEngine::new();
    engine
        .subscribe(PANE, subscription, loaded.bars)
        .context("Invalid subscription")?;
    engine.wait_idle(Duration::from_secs(300));

    if !loaded.ticks.is_empty() {
        let events = loaded
            .ticks
            .into_iter()
            .map(|tick| (PANE.to_string(), TransportEvent::Tick(tick)))
            .collect();
        let ops = engine.handle_batch(events);
        log::info!(
            "Replayed ticks: {} render ops",
            ops.iter().map(|(_, ops)| ops.len()).sum::<usize>()
        );
    }

    let pane = engine.pane(PANE).context("Pane vanished")?;
    if let Some(error) = &pane.last_error {
        anyhow::bail!("Indicator computation failed: {}", error);
    }
    let bars = pane.bars();
    let stats = pane.stats();

    let range = match (args.visible_from, args.visible_to) {
        (None, None) => None,
        (from, to) => Some(VisibleRange::new(
            from.unwrap_or(i64::MIN),
            to.unwrap_or(i64::MAX),
        )),
    };

    let mut options = OhlcOptions::default();
    if args.session_guard {
        options.session = Some(SESSION);
    }
    let candles = Series::Candles(match range {
        Some(focus) if args.focus => decimate_ohlc_focus(bars, focus, args.budget, &options),
        Some(range) => decimate_ohlc(visible_slice(bars, range), args.budget, &options),
        None => decimate_ohlc(bars, args.budget, &options),
    });

    let mut lines = Vec::new();
    let mut indicators = Vec::new();
    for computed in pane.computed() {
        let series = &computed.series;
        for (name, points) in series.lines() {
            let label = format!("{}.{}", series.kind, name);
            lines.push((label, decimate(&Series::Line(points), args.budget, range)));
        }
        indicators.push(IndicatorSummary {
            kind: series.kind,
            points: series.len(),
            last: series.points.last().copied(),
            signals: series.signals.clone(),
        });
    }

    Ok(RunSummary {
        symbol: args.symbol.clone(),
        timeframe: args.timeframe,
        source: loaded.source,
        bars: bars.len(),
        validation: validate_series(bars, args.timeframe),
        stream: (stats != AggregatorStats::default()).then_some(stats),
        indicators,
        range,
        candles,
        lines,
    })
}
