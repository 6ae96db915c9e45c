//! Day-by-day orchestration of the breakout engine.
//!
//! The engine owns nothing but references to its ports and the account it is
//! handed. Each trading day it builds one simulator per symbol, walks the
//! merged minute timeline, and applies every account change as an
//! [`AccountEvent`] in timestamp order. Exits at a timestamp are processed
//! before entries at the same timestamp, so a slot freed by a close can be
//! taken by a breakout in the same minute.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use super::account::{AccountEvent, AccountState};
use super::bar::{Bar, SeriesDefect, validate_series};
use super::config::OrbConfig;
use super::market::MarketContext;
use super::metrics::{PerformanceSnapshot, Period};
use super::opening_range::{bars_after_range, compute_opening_range};
use super::risk::{BlockReason, BlockScope, GateDecision, RiskGatekeeper};
use super::session::trading_days;
use super::simulator::{BarEvent, SymbolDaySimulator};
use super::sizing::PositionSizer;
use super::trade::Trade;
use crate::ports::data_port::DataPort;
use crate::ports::market_port::MarketPort;

/// Why a symbol produced no simulator for the day.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    DataUnavailable(String),
    InvalidSeries(SeriesDefect),
    NoOpeningRange,
    NoPostRangeBars,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::DataUnavailable(reason) => write!(f, "data unavailable: {reason}"),
            SkipReason::InvalidSeries(defect) => write!(f, "invalid bar series: {defect}"),
            SkipReason::NoOpeningRange => write!(f, "no bars in the opening range"),
            SkipReason::NoPostRangeBars => write!(f, "no bars after the opening range"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayResult {
    pub date: NaiveDate,
    pub volatility_index: f64,
    pub starting_equity: f64,
    pub ending_equity: f64,
    pub trades: Vec<Trade>,
    pub skipped: Vec<SkippedSymbol>,
    /// The block that ended entries for the rest of the day, if any.
    pub halted: Option<BlockReason>,
    /// Candidates turned away by the gate or sized to zero shares.
    pub rejected_candidates: usize,
}

impl DayResult {
    pub fn pnl(&self) -> f64 {
        self.ending_equity - self.starting_equity
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub initial_capital: f64,
    pub days: Vec<DayResult>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    /// Account after the last day; feed it back to `run` to resume.
    pub account: AccountState,
}

impl BacktestResult {
    pub fn snapshot(&self, period: Period) -> PerformanceSnapshot {
        PerformanceSnapshot::from_ledger(self.initial_capital, &self.trades, period)
    }

    pub fn skipped_symbol_days(&self) -> usize {
        self.days.iter().map(|d| d.skipped.len()).sum()
    }
}

struct SymbolDay {
    sim: SymbolDaySimulator,
    bars: Vec<Bar>,
    cursor: usize,
}

impl SymbolDay {
    fn next_at(&self, ts: NaiveDateTime) -> Option<&Bar> {
        self.bars.get(self.cursor).filter(|b| b.timestamp == ts)
    }

    fn exhausted(&self) -> bool {
        self.cursor >= self.bars.len()
    }
}

pub struct Engine<'a> {
    config: &'a OrbConfig,
    data: &'a dyn DataPort,
    market: &'a dyn MarketPort,
    sizer: PositionSizer,
    gate: RiskGatekeeper,
}

impl<'a> Engine<'a> {
    pub fn new(config: &'a OrbConfig, data: &'a dyn DataPort, market: &'a dyn MarketPort) -> Self {
        Engine {
            config,
            data,
            market,
            sizer: PositionSizer::standard(&config.sizing),
            gate: RiskGatekeeper::new(config.risk, config.filter),
        }
    }

    /// Replace the standard rule stack.
    pub fn with_sizer(mut self, sizer: PositionSizer) -> Self {
        self.sizer = sizer;
        self
    }

    /// Run every trading day of the configured date range from a fresh account.
    pub fn run_configured(&self) -> BacktestResult {
        let days = trading_days(self.config.backtest.start_date, self.config.backtest.end_date);
        self.run(&days, AccountState::new(self.config.backtest.initial_capital))
    }

    /// Run the given days in order, starting from `account`.
    pub fn run(&self, days: &[NaiveDate], mut account: AccountState) -> BacktestResult {
        let initial_capital = account.equity;
        info!(
            days = days.len(),
            symbols = self.config.backtest.symbols.len(),
            equity = account.equity,
            "backtest started"
        );

        let mut results = Vec::with_capacity(days.len());
        let mut trades = Vec::new();
        let mut equity_curve = Vec::with_capacity(days.len());

        for &date in days {
            let day = self.run_day(date, &mut account);
            trades.extend(day.trades.iter().cloned());
            equity_curve.push(EquityPoint {
                date,
                equity: account.equity,
            });
            results.push(day);
        }

        info!(
            trades = trades.len(),
            equity = account.equity,
            "backtest finished"
        );

        BacktestResult {
            initial_capital,
            days: results,
            trades,
            equity_curve,
            account,
        }
    }

    /// Simulate one session across the universe and close the day on the account.
    pub fn run_day(&self, date: NaiveDate, account: &mut AccountState) -> DayResult {
        let volatility_index = self
            .market
            .volatility_index(date)
            .unwrap_or(self.config.backtest.default_volatility);

        let mut day = DayResult {
            date,
            volatility_index,
            starting_equity: account.equity,
            ending_equity: account.equity,
            trades: Vec::new(),
            skipped: Vec::new(),
            halted: None,
            rejected_candidates: 0,
        };

        let mut books = Vec::new();
        for symbol in &self.config.backtest.symbols {
            match self.prepare(symbol, date) {
                Ok(book) => books.push(book),
                Err(reason) => {
                    match &reason {
                        SkipReason::DataUnavailable(_) => {
                            warn!(%symbol, %date, %reason, "symbol-day skipped")
                        }
                        _ => debug!(%symbol, %date, %reason, "symbol-day skipped"),
                    }
                    day.skipped.push(SkippedSymbol {
                        symbol: symbol.clone(),
                        reason,
                    });
                }
            }
        }

        let books_opened = books.len();
        let mut timeline: Vec<NaiveDateTime> = books
            .iter()
            .flat_map(|b| b.bars.iter().map(|bar| bar.timestamp))
            .collect();
        timeline.sort_unstable();
        timeline.dedup();

        let mut warned = false;
        for ts in timeline {
            // exits first
            for book in books.iter_mut() {
                let Some(bar) = book.next_at(ts).cloned() else {
                    continue;
                };
                if book.sim.is_scanning() {
                    continue;
                }
                book.cursor += 1;
                if let BarEvent::Exit(trade) = book.sim.on_bar(&bar) {
                    self.close(trade, account, &mut day, &mut warned);
                }
            }

            // then entries
            for i in 0..books.len() {
                let Some(bar) = books[i].next_at(ts).cloned() else {
                    continue;
                };
                books[i].cursor += 1;
                let BarEvent::Candidate(candidate) = books[i].sim.on_bar(&bar) else {
                    continue;
                };
                if books[i].exhausted() {
                    debug!(
                        symbol = %candidate.symbol,
                        time = %candidate.time,
                        "breakout on the last bar, no bar left to exit on"
                    );
                    continue;
                }

                let context = MarketContext::at(&self.config.session, ts, volatility_index);
                if let GateDecision::Block(reason) = self.gate.check(account, &context) {
                    day.rejected_candidates += 1;
                    if reason.scope() == BlockScope::Day {
                        day.halted = Some(reason);
                        for book in books.iter_mut().filter(|b| b.sim.is_scanning()) {
                            book.sim.abandon();
                        }
                    }
                    continue;
                }

                let sizing = self.sizer.size(
                    account,
                    &context,
                    candidate.entry_price,
                    candidate.stop_price,
                );
                if !sizing.is_tradeable() {
                    day.rejected_candidates += 1;
                    debug!(
                        symbol = %candidate.symbol,
                        time = %candidate.time,
                        adjusted_risk = sizing.adjusted_risk,
                        "zero-size candidate, still scanning"
                    );
                    continue;
                }

                if books[i].sim.open(&candidate, sizing.shares) {
                    account.apply(&AccountEvent::PositionOpened);
                    info!(
                        symbol = %candidate.symbol,
                        time = %candidate.time,
                        entry = candidate.entry_price,
                        stop = candidate.stop_price,
                        target = candidate.target_price,
                        shares = sizing.shares,
                        multiplier = sizing.combined_multiplier(),
                        "entry"
                    );
                }
            }

            // positions whose data ran out leave at their last close
            for book in books.iter_mut().filter(|b| b.exhausted() && b.sim.is_open()) {
                if let Some(trade) = book.sim.finish() {
                    self.close(trade, account, &mut day, &mut warned);
                }
            }
        }

        if account.consecutive_losses >= self.config.risk.max_consecutive_losses {
            info!(
                %date,
                streak = account.consecutive_losses,
                "loss streak reset after cooling-off day"
            );
            account.apply(&AccountEvent::LossStreakReset);
        }
        if books_opened == 0 {
            // no usable data for any symbol, e.g. a weekday holiday
            account.apply(&AccountEvent::DaySkipped);
        } else {
            account.apply(&AccountEvent::DayClosed);
        }
        day.ending_equity = account.equity;

        info!(
            %date,
            trades = day.trades.len(),
            skipped = day.skipped.len(),
            pnl = day.pnl(),
            equity = account.equity,
            halted = ?day.halted,
            "day closed"
        );
        day
    }

    fn prepare(&self, symbol: &str, date: NaiveDate) -> Result<SymbolDay, SkipReason> {
        let session = &self.config.session;
        let bars: Vec<Bar> = self
            .data
            .fetch_bars(symbol, date)
            .map_err(|e| SkipReason::DataUnavailable(e.to_string()))?
            .into_iter()
            .filter(|b| b.date() == date && session.contains(b.timestamp))
            .collect();
        validate_series(&bars).map_err(SkipReason::InvalidSeries)?;

        let range = compute_opening_range(&bars, session.open_at(date), self.config.orb_minutes)
            .ok_or(SkipReason::NoOpeningRange)?;
        let after = bars_after_range(&bars, &range);
        if after.is_empty() {
            return Err(SkipReason::NoPostRangeBars);
        }

        Ok(SymbolDay {
            sim: SymbolDaySimulator::new(
                symbol,
                &range,
                self.config.breakout,
                self.config.commission,
            ),
            bars: after.to_vec(),
            cursor: 0,
        })
    }

    fn close(&self, trade: Trade, account: &mut AccountState, day: &mut DayResult, warned: &mut bool) {
        account.apply(&AccountEvent::TradeClosed { pnl: trade.pnl });
        info!(
            symbol = %trade.symbol,
            time = %trade.exit_time,
            reason = %trade.exit_reason,
            exit = trade.exit_price,
            pnl = trade.pnl,
            equity = account.equity,
            "exit"
        );
        if !*warned && self.gate.daily_loss_warning(account) {
            *warned = true;
            warn!(
                daily_pnl = account.daily_pnl,
                fraction = account.daily_pnl_fraction(),
                warn_tier = self.gate.limits.daily_loss_warn,
                "daily loss warning tier crossed"
            );
        }
        day.trades.push(trade);
    }
}
