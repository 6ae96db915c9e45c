//! Breakout trade simulator.
//!
//! [`SymbolDaySimulator`] is a per-symbol-day state machine fed one bar at a
//! time. It reports breakout candidates back to the caller, who decides
//! whether to open a position (risk gate, sizing), and resolves the open
//! position to exactly one of STOP, TARGET or TIME.
//!
//! Conventions:
//! - entry price is the close of the breakout bar;
//! - exits are evaluated from the bar after entry onward;
//! - when a bar reaches both stop and target, STOP wins.

use chrono::NaiveDateTime;
use tracing::debug;

use super::bar::Bar;
use super::commission::CommissionSchedule;
use super::opening_range::{OpeningRange, bars_after_range};
use super::trade::{ExitReason, OpenPosition, Trade};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakoutParams {
    pub breakout_buffer: f64,
    /// Signed, negative for a long stop below entry.
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Default for BreakoutParams {
    fn default() -> Self {
        BreakoutParams {
            breakout_buffer: 0.001,
            stop_loss_pct: -0.01,
            take_profit_pct: 0.03,
        }
    }
}

impl BreakoutParams {
    pub fn stop_price(&self, entry: f64) -> f64 {
        entry * (1.0 + self.stop_loss_pct)
    }

    pub fn target_price(&self, entry: f64) -> f64 {
        entry * (1.0 + self.take_profit_pct)
    }
}

/// A breakout that may become a position if the caller admits and sizes it.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryCandidate {
    pub symbol: String,
    pub time: NaiveDateTime,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
}

impl EntryCandidate {
    pub fn stop_distance(&self) -> f64 {
        (self.entry_price - self.stop_price).abs()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BarEvent {
    None,
    Candidate(EntryCandidate),
    Exit(Trade),
}

#[derive(Debug, Clone, PartialEq)]
enum SimState {
    Scanning,
    Open(OpenPosition),
    Resolved,
    Abandoned,
}

#[derive(Debug, Clone)]
pub struct SymbolDaySimulator {
    symbol: String,
    breakout_level: f64,
    params: BreakoutParams,
    commission: CommissionSchedule,
    state: SimState,
    last_bar: Option<(NaiveDateTime, f64)>,
}

impl SymbolDaySimulator {
    pub fn new(
        symbol: &str,
        range: &OpeningRange,
        params: BreakoutParams,
        commission: CommissionSchedule,
    ) -> Self {
        SymbolDaySimulator {
            symbol: symbol.to_string(),
            breakout_level: range.breakout_level(params.breakout_buffer),
            params,
            commission,
            state: SimState::Scanning,
            last_bar: None,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn breakout_level(&self) -> f64 {
        self.breakout_level
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self.state, SimState::Scanning)
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SimState::Open(_))
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, SimState::Resolved | SimState::Abandoned)
    }

    pub fn position(&self) -> Option<&OpenPosition> {
        match &self.state {
            SimState::Open(pos) => Some(pos),
            _ => None,
        }
    }

    pub fn on_bar(&mut self, bar: &Bar) -> BarEvent {
        self.last_bar = Some((bar.timestamp, bar.close));

        let exit = match &self.state {
            SimState::Scanning => return self.detect_breakout(bar),
            SimState::Open(pos) if bar.timestamp > pos.entry_time => {
                if pos.should_stop(bar.low) {
                    Some((pos.stop_price, ExitReason::Stop))
                } else if pos.should_take_profit(bar.high) {
                    Some((pos.target_price, ExitReason::Target))
                } else {
                    None
                }
            }
            _ => None,
        };

        match exit.and_then(|(price, reason)| self.resolve(bar.timestamp, price, reason)) {
            Some(trade) => BarEvent::Exit(trade),
            None => BarEvent::None,
        }
    }

    fn detect_breakout(&self, bar: &Bar) -> BarEvent {
        if bar.close <= self.breakout_level {
            return BarEvent::None;
        }
        let entry_price = bar.close;
        let stop_price = self.params.stop_price(entry_price);
        let target_price = self.params.target_price(entry_price);
        let distance = (entry_price - stop_price).abs();
        if !distance.is_finite() || distance <= 0.0 {
            debug!(symbol = %self.symbol, time = %bar.timestamp, "zero stop distance, candidate skipped");
            return BarEvent::None;
        }
        BarEvent::Candidate(EntryCandidate {
            symbol: self.symbol.clone(),
            time: bar.timestamp,
            entry_price,
            stop_price,
            target_price,
        })
    }

    /// Open a position for a candidate this simulator produced. Returns
    /// false (and leaves the simulator scanning) for a zero share count or
    /// when not scanning.
    pub fn open(&mut self, candidate: &EntryCandidate, shares: u64) -> bool {
        if shares == 0 || !self.is_scanning() {
            return false;
        }
        self.state = SimState::Open(OpenPosition {
            symbol: self.symbol.clone(),
            entry_time: candidate.time,
            entry_price: candidate.entry_price,
            stop_price: candidate.stop_price,
            target_price: candidate.target_price,
            shares,
        });
        true
    }

    /// Stop scanning for entries. An open position is unaffected.
    pub fn abandon(&mut self) {
        if self.is_scanning() {
            self.state = SimState::Abandoned;
        }
    }

    /// End of data. An open position exits at the last seen close as TIME.
    pub fn finish(&mut self) -> Option<Trade> {
        if self.is_scanning() {
            self.state = SimState::Abandoned;
            return None;
        }
        let (time, close) = self.last_bar?;
        self.resolve(time, close, ExitReason::Time)
    }

    fn resolve(&mut self, time: NaiveDateTime, price: f64, reason: ExitReason) -> Option<Trade> {
        match std::mem::replace(&mut self.state, SimState::Resolved) {
            SimState::Open(pos) => Some(pos.close(time, price, reason, &self.commission)),
            other => {
                self.state = other;
                None
            }
        }
    }
}

/// Simulate one symbol-day end to end with a sizing callback.
///
/// `size` maps a candidate to a share count; zero rejects the candidate and
/// scanning continues on the next bar.
pub fn simulate_symbol_day<F>(
    symbol: &str,
    bars: &[Bar],
    range: &OpeningRange,
    params: BreakoutParams,
    commission: CommissionSchedule,
    mut size: F,
) -> Option<Trade>
where
    F: FnMut(&EntryCandidate) -> u64,
{
    let mut sim = SymbolDaySimulator::new(symbol, range, params, commission);
    let after = bars_after_range(bars, range);
    for (i, bar) in after.iter().enumerate() {
        match sim.on_bar(bar) {
            BarEvent::Candidate(candidate) if i + 1 == after.len() => {
                debug!(symbol, time = %candidate.time, "breakout on the last bar, no bar left to exit on");
            }
            BarEvent::Candidate(candidate) => {
                let shares = size(&candidate);
                if !sim.open(&candidate, shares) {
                    debug!(symbol, time = %candidate.time, "zero-size candidate, scanning on");
                }
            }
            BarEvent::Exit(trade) => return Some(trade),
            BarEvent::None => {}
        }
    }
    sim.finish()
}
