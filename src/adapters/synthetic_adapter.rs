//! Seeded synthetic market: one-minute bars and a daily volatility level.
//!
//! Each symbol-day draws from its own `StdRng` seeded from the run seed, the
//! symbol and the date, so a symbol-day's bars do not depend on which other
//! symbols or days were requested.

use chrono::{Datelike, Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::bar::Bar;
use crate::domain::error::OrbError;
use crate::domain::session::{SessionHours, is_trading_day};
use crate::ports::data_port::DataPort;
use crate::ports::market_port::MarketPort;

pub struct SyntheticAdapter {
    seed: u64,
    session: SessionHours,
}

impl SyntheticAdapter {
    pub fn new(seed: u64, session: SessionHours) -> Self {
        Self { seed, session }
    }

    fn rng_for(&self, symbol: &str, date: NaiveDate) -> StdRng {
        let mut key = fnv1a(symbol.as_bytes());
        key ^= u64::from(date.num_days_from_ce().unsigned_abs()).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        StdRng::seed_from_u64(self.seed ^ key)
    }

    /// A stable per-symbol price level between 20 and 500.
    fn base_price(&self, symbol: &str) -> f64 {
        let mut rng = StdRng::seed_from_u64(self.seed ^ fnv1a(symbol.as_bytes()));
        rng.gen_range(20.0..500.0)
    }

    pub fn generate(&self, symbol: &str, date: NaiveDate) -> Vec<Bar> {
        let mut rng = self.rng_for(symbol, date);
        let minutes = self.session.length_minutes().max(0);

        // gap from the symbol's base level, then a drifting random walk
        let mut price = self.base_price(symbol) * (1.0 + rng.gen_range(-0.03..0.03));
        let drift = rng.gen_range(-0.0004..0.0006);
        let open_at = self.session.open_at(date);

        let mut bars = Vec::with_capacity(minutes as usize);
        for minute in 0..minutes {
            // the first half hour is noisier
            let sigma = if minute < 30 { 0.0025 } else { 0.0012 };
            let ret = drift + rng.gen_range(-sigma..sigma);
            let open = price;
            let close = (open * (1.0 + ret)).max(0.01);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.0008));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.0008));
            bars.push(Bar {
                timestamp: open_at + Duration::minutes(minute),
                open,
                high,
                low,
                close,
                volume: rng.gen_range(1_000..60_000),
            });
            price = close;
        }
        bars
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

impl DataPort for SyntheticAdapter {
    fn fetch_bars(&self, symbol: &str, date: NaiveDate) -> Result<Vec<Bar>, OrbError> {
        if !is_trading_day(date) {
            return Err(OrbError::data(symbol, date, "market closed"));
        }
        Ok(self.generate(symbol, date))
    }
}

impl MarketPort for SyntheticAdapter {
    fn volatility_index(&self, date: NaiveDate) -> Option<f64> {
        let mut rng = self.rng_for("^VIX", date);
        Some(rng.gen_range(12.0..35.0))
    }
}
