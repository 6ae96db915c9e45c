//! Open positions and closed trades.

use chrono::NaiveDateTime;

use super::commission::CommissionSchedule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExitReason {
    Stop,
    Target,
    Time,
}

impl ExitReason {
    pub const ALL: [ExitReason; 3] = [ExitReason::Stop, ExitReason::Target, ExitReason::Time];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Stop => "STOP",
            ExitReason::Target => "TARGET",
            ExitReason::Time => "TIME",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExitReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STOP" => Ok(ExitReason::Stop),
            "TARGET" => Ok(ExitReason::Target),
            "TIME" => Ok(ExitReason::Time),
            other => Err(format!("unknown exit reason '{other}'")),
        }
    }
}

/// A long position opened on a breakout, waiting for its exit.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub symbol: String,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub shares: u64,
}

impl OpenPosition {
    pub fn market_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.shares as f64 * (price - self.entry_price)
    }

    pub fn should_stop(&self, low: f64) -> bool {
        low <= self.stop_price
    }

    pub fn should_take_profit(&self, high: f64) -> bool {
        high >= self.target_price
    }

    pub fn close(
        self,
        exit_time: NaiveDateTime,
        exit_price: f64,
        exit_reason: ExitReason,
        commission: &CommissionSchedule,
    ) -> Trade {
        let fees = commission.round_trip(self.shares);
        let gross = (exit_price - self.entry_price) * self.shares as f64;
        let hold_minutes = (exit_time - self.entry_time).num_minutes().max(0);
        Trade {
            symbol: self.symbol,
            entry_time: self.entry_time,
            entry_price: self.entry_price,
            exit_time,
            exit_price,
            exit_reason,
            shares: self.shares,
            stop_price: self.stop_price,
            target_price: self.target_price,
            commission: fees,
            pnl: gross - fees,
            hold_minutes,
        }
    }
}

/// A resolved round trip. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub symbol: String,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub shares: u64,
    pub stop_price: f64,
    pub target_price: f64,
    pub commission: f64,
    /// Net of commission.
    pub pnl: f64,
    pub hold_minutes: i64,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.pnl < 0.0
    }

    pub fn gross_pnl(&self) -> f64 {
        (self.exit_price - self.entry_price) * self.shares as f64
    }

    pub fn position_value(&self) -> f64 {
        self.entry_price * self.shares as f64
    }
}
