use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::data::normalizer::normalize_with_report;
use crate::data::bucket_clock::BucketClock;
use crate::domain::{Bar, RawBar, Timeframe};
use crate::utils::time_utils::epoch_sec_to_utc;

/// A (symbol, timeframe, range) query. Range bounds are inclusive epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub from: Option<i64>,
    pub to: Option<i64>,
}

impl HistoryRequest {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            from: None,
            to: None,
        }
    }

    pub fn with_range(mut self, from: Option<i64>, to: Option<i64>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    fn contains(&self, bucket_start: i64) -> bool {
        self.from.is_none_or(|from| bucket_start >= from) && self.to.is_none_or(|to| bucket_start <= to)
    }
}

/// Source of historical bars. Results may be unsorted, duplicated or gapped.
#[async_trait]
pub trait HistoricalBars: Send + Sync {
    async fn fetch_bars(&self, request: &HistoryRequest) -> Result<Vec<RawBar>>;

    /// A unique identifier for this implementation (so callers know which one answered).
    fn signature(&self) -> &'static str;
}

/// On-disk layout: either a bare array of bars or an object carrying the symbol.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistoryFile {
    Bars(Vec<RawBar>),
    Tagged { symbol: String, bars: Vec<RawBar> },
}

/// Reads bars from a JSON file.
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl HistoricalBars for JsonFileProvider {
    async fn fetch_bars(&self, request: &HistoryRequest) -> Result<Vec<RawBar>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read history file: {}", self.path.display()))?;
        let file: HistoryFile = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse history file: {}", self.path.display()))?;
        match file {
            HistoryFile::Bars(bars) => Ok(bars),
            HistoryFile::Tagged { symbol, bars } if symbol.eq_ignore_ascii_case(&request.symbol) => {
                Ok(bars)
            }
            HistoryFile::Tagged { symbol, .. } => Err(anyhow!(
                "{} holds {}, not {}",
                self.path.display(),
                symbol,
                request.symbol
            )),
        }
    }

    fn signature(&self) -> &'static str {
        "JSON File"
    }
}

/// Serves a fixed set of bars regardless of symbol.
pub struct StaticProvider {
    bars: Vec<RawBar>,
}

impl StaticProvider {
    pub fn new(bars: Vec<RawBar>) -> Self {
        Self { bars }
    }
}

#[async_trait]
impl HistoricalBars for StaticProvider {
    async fn fetch_bars(&self, _request: &HistoryRequest) -> Result<Vec<RawBar>> {
        if self.bars.is_empty() {
            return Err(anyhow!("static provider has no bars"));
        }
        Ok(self.bars.clone())
    }

    fn signature(&self) -> &'static str {
        "Static"
    }
}

/// Ask each provider in turn; normalize the first successful answer.
pub async fn load_history(
    providers: &[Box<dyn HistoricalBars>],
    request: &HistoryRequest,
) -> Result<(Vec<Bar>, &'static str)> {
    for provider in providers {
        match provider.fetch_bars(request).await {
            Ok(raw) => {
                let (bars, report) =
                    normalize_with_report(&raw, request.timeframe, &BucketClock::default());
                let bars: Vec<Bar> = bars.into_iter().filter(|b| request.contains(b.time)).collect();
                log::info!(
                    "Loaded {} {} bars for {} from {} ({} raw, {} malformed, {} filled)",
                    bars.len(),
                    request.timeframe,
                    request.symbol,
                    provider.signature(),
                    report.input,
                    report.malformed,
                    report.filled
                );
                if let (Some(first), Some(last)) = (bars.first(), bars.last()) {
                    log::debug!("History spans {} .. {}", epoch_sec_to_utc(first.time), epoch_sec_to_utc(last.time));
                }
                return Ok((bars, provider.signature()));
            }
            Err(e) => {
                log::info!("Provider {} failed: {:#}", provider.signature(), e);
                // Continue to the next provider
            }
        }
    }
    Err(anyhow!(
        "All providers failed to load {} {}",
        request.symbol,
        request.timeframe
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bars() -> Vec<RawBar> {
        vec![
            RawBar::new(120_i64, 3.0, 3.5, 2.5, 3.2, 1.0),
            RawBar::new(0_i64, 1.0, 1.5, 0.5, 1.2, 1.0),
            RawBar::new(10_i64, 1.2, 2.0, 1.1, 1.8, 2.0),
        ]
    }

    #[tokio::test]
    async fn test_falls_through_to_next_provider() {
        let providers: Vec<Box<dyn HistoricalBars>> = vec![
            Box::new(JsonFileProvider::new("/definitely/not/here.json")),
            Box::new(StaticProvider::new(sample_bars())),
        ];
        let request = HistoryRequest::new("SPY", Timeframe::Min1);
        let (bars, signature) = load_history(&providers, &request).await.unwrap();
        assert_eq!(signature, "Static");
        let times: Vec<i64> = bars.iter().map(|b| b.time).collect();
        assert_eq!(times, vec![0, 60, 120]);
        assert_eq!(bars[0].close, 1.8);
    }

    #[tokio::test]
    async fn test_range_filter() {
        let providers: Vec<Box<dyn HistoricalBars>> =
            vec![Box::new(StaticProvider::new(sample_bars()))];
        let request = HistoryRequest::new("SPY", Timeframe::Min1).with_range(Some(60), None);
        let (bars, _) = load_history(&providers, &request).await.unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].time, 60);
    }

    #[tokio::test]
    async fn test_all_failing_is_an_error() {
        let providers: Vec<Box<dyn HistoricalBars>> = vec![Box::new(StaticProvider::new(vec![]))];
        let request = HistoryRequest::new("SPY", Timeframe::Min1);
        assert!(load_history(&providers, &request).await.is_err());
    }

    #[tokio::test]
    async fn test_json_file_provider_reads_tagged_file() {
        let path = std::env::temp_dir().join(format!("bar_pipeline_history_{}.json", std::process::id()));
        let body = r#"{"symbol":"spy","bars":[{"time":60,"open":1,"high":2,"low":0.5,"close":1.5,"volume":4}]}"#;
        tokio::fs::write(&path, body).await.unwrap();

        let provider = JsonFileProvider::new(&path);
        let raw = provider
            .fetch_bars(&HistoryRequest::new("SPY", Timeframe::Min1))
            .await
            .unwrap();
        assert_eq!(raw.len(), 1);
        assert!(
            provider
                .fetch_bars(&HistoryRequest::new("QQQ", Timeframe::Min1))
                .await
                .is_err()
        );
        let _ = tokio::fs::remove_file(&path).await;
    }
}
