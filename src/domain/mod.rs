// Domain types and value objects
pub mod bar;
pub mod series;
pub mod timeframe;

// Re-export commonly used types
pub use bar::{Bar, PriceSample, RawBar, RawTime, Tick};
pub use series::{LinePoint, Point, Series, close_line};
pub use timeframe::Timeframe;
