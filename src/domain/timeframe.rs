use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::PipelineError;
use crate::utils::TimeUtils;

/// Bucket granularity of a chart.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
pub enum Timeframe {
    #[strum(to_string = "1m", serialize = "1Min")]
    #[serde(rename = "1m", alias = "1Min")]
    Min1,
    #[strum(to_string = "5m", serialize = "5Min")]
    #[serde(rename = "5m", alias = "5Min")]
    Min5,
    #[strum(to_string = "10m", serialize = "10Min")]
    #[serde(rename = "10m", alias = "10Min")]
    Min10,
    #[strum(to_string = "15m", serialize = "15Min")]
    #[serde(rename = "15m", alias = "15Min")]
    Min15,
    #[strum(to_string = "1h", serialize = "1Hour")]
    #[serde(rename = "1h", alias = "1Hour")]
    Hour1,
    #[strum(to_string = "4h", serialize = "4Hour")]
    #[serde(rename = "4h", alias = "4Hour")]
    Hour4,
    #[strum(to_string = "1d", serialize = "1Day")]
    #[serde(rename = "1d", alias = "1Day")]
    Day1,
    #[strum(to_string = "1w", serialize = "1Week")]
    #[serde(rename = "1w", alias = "1Week")]
    Week1,
}

impl Timeframe {
    /// Length of one bucket in seconds.
    pub fn seconds(&self) -> i64 {
        match self {
            Timeframe::Min1 => TimeUtils::SEC_IN_MIN,
            Timeframe::Min5 => TimeUtils::SEC_IN_5_MIN,
            Timeframe::Min10 => TimeUtils::SEC_IN_10_MIN,
            Timeframe::Min15 => TimeUtils::SEC_IN_15_MIN,
            Timeframe::Hour1 => TimeUtils::SEC_IN_H,
            Timeframe::Hour4 => TimeUtils::SEC_IN_4_H,
            Timeframe::Day1 => TimeUtils::SEC_IN_D,
            Timeframe::Week1 => TimeUtils::SEC_IN_W,
        }
    }

    /// Intraday timeframes are anchored to the session open; daily and weekly ones
    /// to calendar boundaries.
    pub fn is_intraday(&self) -> bool {
        self.seconds() < TimeUtils::SEC_IN_D
    }

    /// Accepts either spelling ("10m" or "10Min").
    pub fn parse(text: &str) -> Result<Self, PipelineError> {
        text.trim()
            .parse()
            .map_err(|_| PipelineError::UnknownTimeframe(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_parse_both_spellings() {
        assert_eq!(Timeframe::from_str("10m").unwrap(), Timeframe::Min10);
        assert_eq!(Timeframe::from_str("4Hour").unwrap(), Timeframe::Hour4);
        assert!(Timeframe::from_str("3m").is_err());
        assert_eq!(Timeframe::Hour1.to_string(), "1h");
        assert_eq!(
            Timeframe::parse("2h"),
            Err(PipelineError::UnknownTimeframe("2h".to_string()))
        );
    }

    #[test]
    fn test_intraday_lengths_divide_a_day() {
        for tf in Timeframe::iter().filter(|tf| tf.is_intraday()) {
            assert_eq!(TimeUtils::SEC_IN_D % tf.seconds(), 0, "{} must tile a day", tf);
        }
    }
}
