#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use orbtrader::domain::bar::Bar;
use orbtrader::domain::config::OrbConfig;
use orbtrader::domain::error::OrbError;
use orbtrader::ports::data_port::DataPort;
use orbtrader::ports::market_port::MarketPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<(String, NaiveDate), Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        let date = bars.first().map(|b| b.date()).unwrap_or_else(|| day(3));
        self.data.insert((symbol.to_string(), date), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(&self, symbol: &str, date: NaiveDate) -> Result<Vec<Bar>, OrbError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(OrbError::data(symbol, date, reason.clone()));
        }
        self.data
            .get(&(symbol.to_string(), date))
            .cloned()
            .ok_or_else(|| OrbError::data(symbol, date, "no file"))
    }
}

pub struct FixedVolatility(pub f64);

impl MarketPort for FixedVolatility {
    fn volatility_index(&self, _date: NaiveDate) -> Option<f64> {
        Some(self.0)
    }
}

/// A weekday in March 2025 (3rd is a Monday).
pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

pub fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
    date.and_hms_opt(h, m, 0).unwrap()
}

pub fn make_bar(ts: NaiveDateTime, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        timestamp: ts,
        open: close.clamp(low, high),
        high,
        low,
        close,
        volume: 1_000,
    }
}

/// Fifteen opening-range bars 09:30-09:44 spanning `low..high`.
pub fn range_bars(date: NaiveDate, high: f64, low: f64) -> Vec<Bar> {
    (30..45)
        .map(|m| make_bar(at(date, 9, m), high, low, (high + low) / 2.0))
        .collect()
}

/// Range [100, 102], breakout close 102.5 at `entry_minute` (09:xx), then
/// `after` bars starting the following minute.
pub fn breakout_day(date: NaiveDate, entry_minute: u32, after: &[(f64, f64, f64)]) -> Vec<Bar> {
    let mut bars = range_bars(date, 102.0, 100.0);
    for m in 45..entry_minute {
        bars.push(make_bar(at(date, 9, m), 101.8, 100.8, 101.5));
    }
    bars.push(make_bar(at(date, 9, entry_minute), 102.6, 101.9, 102.5));
    for (i, &(high, low, close)) in after.iter().enumerate() {
        let ts = at(date, 9, entry_minute) + chrono::Duration::minutes(i as i64 + 1);
        bars.push(make_bar(ts, high, low, close));
    }
    bars
}

/// Breakout at 09:46 then a bar whose low 101.2 hits the 101.475 stop.
pub fn stop_out_day(date: NaiveDate) -> Vec<Bar> {
    breakout_day(date, 46, &[(102.4, 101.2, 101.3), (101.6, 101.0, 101.5)])
}

/// Breakout at 09:46 then a bar reaching the 105.575 target.
pub fn target_day(date: NaiveDate) -> Vec<Bar> {
    breakout_day(date, 46, &[(103.5, 102.2, 103.4), (105.8, 103.3, 105.6)])
}

/// Breakout at `entry_minute`, position still open when data ends.
pub fn drifting_day(date: NaiveDate, entry_minute: u32, bars_after: usize) -> Vec<Bar> {
    let after: Vec<(f64, f64, f64)> = (0..bars_after).map(|_| (103.0, 102.2, 102.8)).collect();
    breakout_day(date, entry_minute, &after)
}

pub fn config(symbols: &[&str], start: NaiveDate, end: NaiveDate) -> OrbConfig {
    OrbConfig::with_defaults(symbols.iter().map(|s| s.to_string()).collect(), start, end)
}
