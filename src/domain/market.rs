//! Market conditions visible to sizing rules and the risk gate.

use chrono::NaiveDateTime;

use super::session::SessionHours;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketContext {
    pub volatility_index: f64,
    pub minutes_since_open: i64,
    pub minutes_until_close: i64,
}

impl MarketContext {
    pub fn at(session: &SessionHours, ts: NaiveDateTime, volatility_index: f64) -> Self {
        MarketContext {
            volatility_index,
            minutes_since_open: session.minutes_since_open(ts),
            minutes_until_close: session.minutes_until_close(ts),
        }
    }

    /// Mid-session context with the given volatility, for sizing outside a
    /// live clock.
    pub fn with_volatility(volatility_index: f64) -> Self {
        MarketContext {
            volatility_index,
            minutes_since_open: 120,
            minutes_until_close: 270,
        }
    }
}
