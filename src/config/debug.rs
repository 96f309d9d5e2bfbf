//! Debugging feature flags.
//!
//! Toggle individual diagnostics here; keep them `false` by default so release
//! builds remain quiet. Most call sites are further gated by `cfg(debug_assertions)`.

/// Emit every append/replace/fill decided by a stream aggregator.
pub const PRINT_STREAM_EVENTS: bool = false;

/// Emit the periodic series validation report (order, duplicates, bars per day).
pub const PRINT_SERIES_VALIDATION: bool = false;

/// Emit worker job durations.
pub const PRINT_WORKER_TIMINGS: bool = true;

/// Emit a line for every dropped tick. The first drop per subscription is always warned.
pub const PRINT_DROPPED_TICKS: bool = false;
