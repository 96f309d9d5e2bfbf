//! Render-budget configuration for the decimators

pub struct DecimationConfig {
    /// Candles drawn per CSS pixel of chart width
    pub points_per_pixel: f64,
    pub device_pixel_ratio: f64,
    /// Never decimate candles below this many output buckets
    pub min_ohlc_budget: usize,
    /// Share of the point budget given to the highlighted range in focus mode
    pub focus_share: f64,
    /// Default LTTB budget for line overlays
    pub default_line_budget: usize,
    /// Synthetic buckets are aligned to this epoch second, never to the visible window
    pub origin_sec: i64,
    /// Cut synthetic candles at the session close by default
    pub session_guard: bool,
}

pub const DECIMATION: DecimationConfig = DecimationConfig {
    points_per_pixel: 1.6,
    device_pixel_ratio: 1.0,
    min_ohlc_budget: 200,
    focus_share: 0.65,
    default_line_budget: 5000,
    origin_sec: 0,
    session_guard: false,
};
