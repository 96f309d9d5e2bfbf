pub mod core;
pub mod messages;
pub mod render;
pub mod state;
pub mod worker;

// Re-export key components
pub use self::core::{ChartEngine, PaneOps};
pub use messages::{ComputedIndicator, JobRequest, JobResult, TransportEvent};
pub use render::{RenderOp, RenderTarget, coalesce_updates};
pub use state::{PaneState, Subscription, VisibleView};
