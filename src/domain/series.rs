use serde::{Deserialize, Serialize};

use crate::domain::Bar;

/// A single-valued chart point (indicator line, close line).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinePoint {
    pub time: i64,
    pub value: f64,
}

impl LinePoint {
    pub fn new(time: i64, value: f64) -> Self {
        LinePoint { time, value }
    }
}

/// What a render surface accepts in `setData`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Series {
    Candles(Vec<Bar>),
    Line(Vec<LinePoint>),
}

impl Series {
    pub fn len(&self) -> usize {
        match self {
            Series::Candles(bars) => bars.len(),
            Series::Line(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a render surface accepts in `update` (append, or replace the last point).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Point {
    Candle(Bar),
    Line(LinePoint),
}

impl Point {
    pub fn time(&self) -> i64 {
        match self {
            Point::Candle(bar) => bar.time,
            Point::Line(point) => point.time,
        }
    }
}

/// Closing prices as a line series.
pub fn close_line(bars: &[Bar]) -> Vec<LinePoint> {
    bars.iter().map(|b| LinePoint::new(b.time, b.close)).collect()
}
