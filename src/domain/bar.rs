//! Intraday OHLCV bar representation.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Bar {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn time(&self) -> NaiveTime {
        self.timestamp.time()
    }

    /// Finite, positive prices with low <= open/close <= high.
    pub fn is_well_formed(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
            && self.volume >= 0
    }
}

/// Why a bar series was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesDefect {
    Empty,
    Malformed { index: usize },
    OutOfOrder { index: usize },
}

impl std::fmt::Display for SeriesDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeriesDefect::Empty => write!(f, "no bars"),
            SeriesDefect::Malformed { index } => write!(f, "malformed bar at index {index}"),
            SeriesDefect::OutOfOrder { index } => {
                write!(f, "timestamp not strictly increasing at index {index}")
            }
        }
    }
}

/// Check that a symbol-day series is non-empty, well formed and strictly
/// ordered by timestamp.
pub fn validate_series(bars: &[Bar]) -> Result<(), SeriesDefect> {
    if bars.is_empty() {
        return Err(SeriesDefect::Empty);
    }
    for (index, bar) in bars.iter().enumerate() {
        if !bar.is_well_formed() {
            return Err(SeriesDefect::Malformed { index });
        }
        if index > 0 && bars[index - 1].timestamp >= bar.timestamp {
            return Err(SeriesDefect::OutOfOrder { index });
        }
    }
    Ok(())
}
