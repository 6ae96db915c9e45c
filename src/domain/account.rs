//! Account state threaded through a run.
//!
//! Sizing and the risk gate only read an [`AccountState`]. The orchestrator
//! is the single writer and changes it by applying [`AccountEvent`]s in
//! chronological order.

use std::collections::VecDeque;

/// Number of daily returns kept for performance-based sizing.
pub const RETURN_HISTORY_DAYS: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    pub equity: f64,
    pub day_start_equity: f64,
    pub daily_pnl: f64,
    pub consecutive_losses: u32,
    pub open_positions: u32,
    pub trades_today: u32,
    pub peak_equity: f64,
    /// Percent below `peak_equity`.
    pub current_drawdown: f64,
    /// Oldest first, at most [`RETURN_HISTORY_DAYS`] entries.
    pub recent_daily_returns: VecDeque<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AccountEvent {
    PositionOpened,
    TradeClosed { pnl: f64 },
    /// Clear the loss streak after a cooling-off session.
    LossStreakReset,
    /// Roll the day: record its return and clear the daily counters.
    DayClosed,
    /// Roll a day on which no symbol had usable data. No return is recorded.
    DaySkipped,
}

impl AccountState {
    pub fn new(initial_capital: f64) -> Self {
        AccountState {
            equity: initial_capital,
            day_start_equity: initial_capital,
            daily_pnl: 0.0,
            consecutive_losses: 0,
            open_positions: 0,
            trades_today: 0,
            peak_equity: initial_capital,
            current_drawdown: 0.0,
            recent_daily_returns: VecDeque::with_capacity(RETURN_HISTORY_DAYS),
        }
    }

    /// `|daily_pnl| / equity`. Measured on magnitude, so a large winning
    /// day also reaches the daily tiers.
    pub fn daily_pnl_fraction(&self) -> f64 {
        if self.equity <= 0.0 {
            return f64::INFINITY;
        }
        self.daily_pnl.abs() / self.equity
    }

    /// The last `n` daily returns, or `None` while fewer are recorded.
    pub fn trailing_returns(&self, n: usize) -> Option<Vec<f64>> {
        if n == 0 || self.recent_daily_returns.len() < n {
            return None;
        }
        let skip = self.recent_daily_returns.len() - n;
        Some(self.recent_daily_returns.iter().skip(skip).copied().collect())
    }

    pub fn apply(&mut self, event: &AccountEvent) {
        match *event {
            AccountEvent::PositionOpened => {
                self.open_positions += 1;
                self.trades_today += 1;
            }
            AccountEvent::TradeClosed { pnl } => {
                self.open_positions = self.open_positions.saturating_sub(1);
                self.equity += pnl;
                self.daily_pnl += pnl;
                if pnl < 0.0 {
                    self.consecutive_losses += 1;
                } else if pnl > 0.0 {
                    self.consecutive_losses = 0;
                }
                self.update_drawdown();
            }
            AccountEvent::LossStreakReset => {
                self.consecutive_losses = 0;
            }
            AccountEvent::DayClosed => {
                let daily_return = if self.day_start_equity > 0.0 {
                    self.daily_pnl / self.day_start_equity
                } else {
                    0.0
                };
                if self.recent_daily_returns.len() == RETURN_HISTORY_DAYS {
                    self.recent_daily_returns.pop_front();
                }
                self.recent_daily_returns.push_back(daily_return);
                self.roll_day();
            }
            AccountEvent::DaySkipped => self.roll_day(),
        }
    }

    fn roll_day(&mut self) {
        self.day_start_equity = self.equity;
        self.daily_pnl = 0.0;
        self.trades_today = 0;
    }

    fn update_drawdown(&mut self) {
        if self.equity > self.peak_equity {
            self.peak_equity = self.equity;
        }
        self.current_drawdown = if self.peak_equity > 0.0 {
            (self.peak_equity - self.equity) / self.peak_equity * 100.0
        } else {
            0.0
        };
    }
}
