//! Trading-session calendar used to anchor intraday buckets.

use serde::{Deserialize, Serialize};

use crate::utils::TimeUtils;

/// Fixed session calendar, expressed in seconds after UTC midnight.
/// Independent of the host timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCalendar {
    /// Regular session open (seconds after 00:00 UTC)
    pub open_offset_sec: i64,
    /// Regular session close (seconds after 00:00 UTC)
    pub close_offset_sec: i64,
}

/// 09:30 - 16:00 US/Eastern (standard time) expressed in UTC.
pub const SESSION: SessionCalendar = SessionCalendar {
    open_offset_sec: 14 * TimeUtils::SEC_IN_H + 30 * TimeUtils::SEC_IN_MIN,
    close_offset_sec: 21 * TimeUtils::SEC_IN_H,
};

impl Default for SessionCalendar {
    fn default() -> Self {
        SESSION
    }
}
