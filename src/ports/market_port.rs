//! Market condition port trait.

use chrono::NaiveDate;

pub trait MarketPort {
    /// Volatility index level for the session, if known.
    fn volatility_index(&self, date: NaiveDate) -> Option<f64>;
}
