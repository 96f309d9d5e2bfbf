use serde::{Deserialize, Serialize};

use crate::utils::maths_utils::{all_finite, max_of, min_of};
use crate::utils::time_utils::{numeric_to_epoch_sec, text_to_epoch_sec};

/// A bucket-aligned OHLCV candle.
///
/// `time` is the bucket start in epoch seconds. Invariant: `high >= max(open, close)`
/// and `low <= min(open, close)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Bar {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Synthetic gap filler: O=H=L=C=`price`, no volume.
    pub fn flat(time: i64, price: f64) -> Self {
        Bar::new(time, price, price, price, price, 0.0)
    }

    /// Open a bar for bucket `time` seeded from a sample.
    pub fn seeded(time: i64, sample: &PriceSample) -> Self {
        Bar::new(
            time,
            sample.open,
            sample.high,
            sample.low,
            sample.close,
            sample.volume,
        )
    }

    /// Fold a later sample of the same bucket into this bar. Open is kept.
    pub fn merge(&mut self, sample: &PriceSample) {
        self.high = self.high.max(sample.high);
        self.low = self.low.min(sample.low);
        self.close = sample.close;
        self.volume += sample.volume;
    }

    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    /// (low, high) of the candle body
    pub fn body_range(&self) -> (f64, f64) {
        if self.is_bullish() {
            (self.open, self.close)
        } else {
            (self.close, self.open)
        }
    }

    pub fn hl2(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    pub fn is_consistent(&self) -> bool {
        let (body_low, body_high) = self.body_range();
        all_finite(&[self.open, self.high, self.low, self.close, self.volume])
            && self.high >= body_high
            && self.low <= body_low
    }
}

/// Timestamp as delivered by a provider or transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTime {
    /// Epoch seconds, ms, µs or ns, told apart by magnitude
    Number(f64),
    /// RFC 3339, or a numeric string
    Text(String),
}

impl RawTime {
    pub fn to_epoch_sec(&self) -> Option<i64> {
        match self {
            RawTime::Number(value) => numeric_to_epoch_sec(*value),
            RawTime::Text(text) => text_to_epoch_sec(text),
        }
    }
}

impl From<i64> for RawTime {
    fn from(epoch_sec: i64) -> Self {
        RawTime::Number(epoch_sec as f64)
    }
}

impl From<f64> for RawTime {
    fn from(value: f64) -> Self {
        RawTime::Number(value)
    }
}

impl From<&str> for RawTime {
    fn from(text: &str) -> Self {
        RawTime::Text(text.to_string())
    }
}

/// A raw bar, tick or partial bar: arbitrary timestamp, not yet bucket-aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub time: RawTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
}

/// Live ticks and partial bars share the raw bar shape.
pub type Tick = RawBar;

impl RawBar {
    pub fn new(
        time: impl Into<RawTime>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        RawBar {
            time: time.into(),
            open,
            high,
            low,
            close,
            volume: Some(volume),
        }
    }

    /// A single trade/quote price with no volume.
    pub fn from_price(time: impl Into<RawTime>, price: f64) -> Self {
        RawBar {
            time: time.into(),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: None,
        }
    }

    /// Validate and widen into a sample, or `None` if malformed.
    ///
    /// Non-finite prices, non-finite or negative volume and unparsable timestamps are
    /// malformed. High/low are widened to bracket open and close.
    pub fn parse(&self) -> Option<PriceSample> {
        let time = self.time.to_epoch_sec()?;
        let prices = [self.open, self.high, self.low, self.close];
        if !all_finite(&prices) {
            return None;
        }
        let volume = self.volume.unwrap_or(0.0);
        if !volume.is_finite() || volume < 0.0 {
            return None;
        }
        Some(PriceSample {
            time,
            open: self.open,
            high: max_of(&prices),
            low: min_of(&prices),
            close: self.close,
            volume,
        })
    }
}

/// A validated raw element: finite prices, parsed timestamp, consistent high/low.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSample {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}
