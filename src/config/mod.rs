//! Configuration module for the bar pipeline.

pub mod decimation;
pub mod indicators;
pub mod session;
pub mod stream;

pub mod debug;

// Re-export commonly used items
pub use decimation::{DECIMATION, DecimationConfig};
pub use indicators::INDICATORS;
pub use session::{SESSION, SessionCalendar};
pub use stream::{STREAM, StreamConfig};
