//! Intraday bar access port trait.

use chrono::NaiveDate;

use crate::domain::bar::Bar;
use crate::domain::error::OrbError;

/// Bar provider for one symbol-day.
///
/// Implementations return bars ordered by timestamp and report missing or
/// unreadable data as [`OrbError::DataUnavailable`]; the caller treats that
/// symbol-day as having no trades.
pub trait DataPort {
    fn fetch_bars(&self, symbol: &str, date: NaiveDate) -> Result<Vec<Bar>, OrbError>;
}
