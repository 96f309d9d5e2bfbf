// Technical indicators: full compute and incremental patching share one step per bar
pub mod bollinger;
pub mod dispatch;
pub mod kdj;
pub mod kmeans;
pub mod patch;
pub mod smoothing;
pub mod supertrend;
pub mod supertrend_ai;

pub use bollinger::{BollingerParams, BollingerPoint, BollingerState};
pub use dispatch::{
    IndicatorKind, IndicatorParams, IndicatorPoint, IndicatorSeries, IndicatorState, compute_indicator,
    compute_indicator_with_state, patch_indicator,
};
pub use kdj::{KdjParams, KdjPoint, KdjState};
pub use kmeans::Cluster;
pub use patch::Patchable;
pub use smoothing::Smoothing;
pub use supertrend::{SupertrendParams, SupertrendPoint, Trend, TrendSignal};
pub use supertrend_ai::{ClusterPick, SupertrendAiParams, SupertrendAiPoint};
