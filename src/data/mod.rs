pub mod aggregator;
pub mod bucket_clock;
pub mod normalizer;
pub mod provider;
pub mod validation;

pub use aggregator::{AggregatorOptions, AggregatorStats, BarUpdate, StreamAggregator, UpdateKind};
pub use bucket_clock::{BucketClock, bucket_length_sec, bucket_start};
pub use normalizer::{NormalizeReport, normalize, normalize_with_report};
pub use provider::{HistoricalBars, HistoryRequest, JsonFileProvider, StaticProvider, load_history};
pub use validation::{SeriesReport, validate_series};
