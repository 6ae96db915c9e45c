//! Risk-level comparison: replay a ledger at other base-risk levels.
//!
//! Share counts scale linearly with the risk budget, so a ledger produced
//! at `base_risk_pct` is rescaled by `level / base_risk_pct` and its P&L
//! recomputed with the commission schedule.

use super::commission::CommissionSchedule;
use super::metrics::{PerformanceSnapshot, Period};
use super::trade::Trade;

/// Percent risked per trade.
pub const DEFAULT_RISK_LEVELS: [f64; 7] = [1.5, 2.0, 2.5, 3.0, 4.0, 5.0, 6.0];

#[derive(Debug, Clone, PartialEq)]
pub struct RiskLevelResult {
    pub risk_pct: f64,
    pub snapshot: PerformanceSnapshot,
}

/// Rescale share counts and recompute P&L. Trades that round down to zero
/// shares are dropped.
pub fn scale_trades(trades: &[Trade], multiplier: f64, commission: &CommissionSchedule) -> Vec<Trade> {
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return Vec::new();
    }
    trades
        .iter()
        .filter_map(|trade| {
            let shares = (trade.shares as f64 * multiplier).floor() as u64;
            if shares == 0 {
                return None;
            }
            let fees = commission.round_trip(shares);
            let gross = (trade.exit_price - trade.entry_price) * shares as f64;
            Some(Trade {
                shares,
                commission: fees,
                pnl: gross - fees,
                ..trade.clone()
            })
        })
        .collect()
}

pub fn analyze_risk_levels(
    trades: &[Trade],
    base_risk_pct: f64,
    levels: &[f64],
    starting_equity: f64,
    commission: &CommissionSchedule,
    period: Period,
) -> Vec<RiskLevelResult> {
    levels
        .iter()
        .filter(|&&level| base_risk_pct > 0.0 && level > 0.0)
        .map(|&risk_pct| {
            let scaled = scale_trades(trades, risk_pct / base_risk_pct, commission);
            RiskLevelResult {
                risk_pct,
                snapshot: PerformanceSnapshot::from_ledger(starting_equity, &scaled, period),
            }
        })
        .collect()
}

pub fn best_by_return(results: &[RiskLevelResult]) -> Option<&RiskLevelResult> {
    results.iter().max_by(|a, b| {
        a.snapshot
            .periods
            .annualized_return
            .total_cmp(&b.snapshot.periods.annualized_return)
    })
}

pub fn best_by_sharpe(results: &[RiskLevelResult]) -> Option<&RiskLevelResult> {
    results
        .iter()
        .max_by(|a, b| a.snapshot.periods.sharpe.total_cmp(&b.snapshot.periods.sharpe))
}
