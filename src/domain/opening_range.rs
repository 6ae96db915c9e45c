//! Opening range: high/low of the first N minutes of a session.

use chrono::{Duration, NaiveDateTime};

use super::bar::Bar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpeningRange {
    pub high: f64,
    pub low: f64,
    /// First instant after the range window; post-range bars start here.
    pub end: NaiveDateTime,
}

impl OpeningRange {
    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    /// Close above this level counts as a long breakout.
    pub fn breakout_level(&self, buffer: f64) -> f64 {
        self.high * (1.0 + buffer)
    }
}

/// High/low over bars with timestamp in `[session_open, session_open + width)`.
///
/// Returns `None` when no bar falls in the window; the caller skips the
/// symbol-day.
pub fn compute_opening_range(
    bars: &[Bar],
    session_open: NaiveDateTime,
    width_minutes: u32,
) -> Option<OpeningRange> {
    let end = session_open + Duration::minutes(i64::from(width_minutes));
    let mut window = bars
        .iter()
        .filter(|bar| bar.timestamp >= session_open && bar.timestamp < end);

    let first = window.next()?;
    let (high, low) = window.fold((first.high, first.low), |(high, low), bar| {
        (high.max(bar.high), low.min(bar.low))
    });

    Some(OpeningRange { high, low, end })
}

/// Bars at or after the end of the range window. Expects bars sorted by
/// timestamp.
pub fn bars_after_range<'a>(bars: &'a [Bar], range: &OpeningRange) -> &'a [Bar] {
    let start = bars.partition_point(|bar| bar.timestamp < range.end);
    &bars[start..]
}
