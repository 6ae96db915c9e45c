//! Performance statistics over a trade ledger and its period series.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::trade::{ExitReason, Trade};

/// Reporting granularity for the period return series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Month,
}

impl Period {
    pub fn periods_per_year(&self) -> f64 {
        match self {
            Period::Day => 252.0,
            Period::Month => 12.0,
        }
    }

    pub fn label(&self, date: NaiveDate) -> String {
        match self {
            Period::Day => date.format("%Y-%m-%d").to_string(),
            Period::Month => date.format("%Y-%m").to_string(),
        }
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(Period::Day),
            "month" | "monthly" => Ok(Period::Month),
            other => Err(format!("unknown period '{other}' (expected day or month)")),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Period::Day => f.write_str("day"),
            Period::Month => f.write_str("month"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExitBreakdown {
    pub stop: usize,
    pub target: usize,
    pub time: usize,
}

impl ExitBreakdown {
    pub fn count(&self, reason: ExitReason) -> usize {
        match reason {
            ExitReason::Stop => self.stop,
            ExitReason::Target => self.target,
            ExitReason::Time => self.time,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeStats {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakeven: usize,
    /// Percent, 0 for an empty ledger.
    pub win_rate: f64,
    pub total_pnl: f64,
    pub total_commission: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    /// `None` when the ledger holds no losing trade.
    pub profit_factor: Option<f64>,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_hold_minutes: f64,
    pub max_consecutive_losses: usize,
    pub exits: ExitBreakdown,
}

impl TradeStats {
    pub fn from_trades(trades: &[Trade]) -> Self {
        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut breakeven = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_commission = 0.0_f64;
        let mut total_hold = 0i64;
        let mut streak = 0usize;
        let mut max_consecutive_losses = 0usize;
        let mut exits = ExitBreakdown::default();

        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                wins += 1;
                gross_profit += pnl;
                largest_win = largest_win.max(pnl);
                streak = 0;
            } else if pnl < 0.0 {
                losses += 1;
                gross_loss += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
                streak += 1;
                max_consecutive_losses = max_consecutive_losses.max(streak);
            } else {
                breakeven += 1;
            }

            total_commission += trade.commission;
            total_hold += trade.hold_minutes;
            match trade.exit_reason {
                ExitReason::Stop => exits.stop += 1,
                ExitReason::Target => exits.target += 1,
                ExitReason::Time => exits.time += 1,
            }
        }

        let total_trades = trades.len();
        let ratio = |num: f64, den: usize| if den > 0 { num / den as f64 } else { 0.0 };

        TradeStats {
            total_trades,
            wins,
            losses,
            breakeven,
            win_rate: ratio(wins as f64 * 100.0, total_trades),
            total_pnl: gross_profit - gross_loss,
            total_commission,
            gross_profit,
            gross_loss,
            profit_factor: (gross_loss > 0.0).then(|| gross_profit / gross_loss),
            avg_win: ratio(gross_profit, wins),
            avg_loss: ratio(gross_loss, losses),
            largest_win,
            largest_loss,
            avg_hold_minutes: ratio(total_hold as f64, total_trades),
            max_consecutive_losses,
            exits,
        }
    }
}

/// Largest peak-to-trough decline in percent, and the longest run of
/// points spent below a prior peak.
pub fn compute_drawdown(curve: &[f64]) -> (f64, usize) {
    let Some(&first) = curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut duration = 0usize;
    let mut max_duration = 0usize;

    for &equity in curve {
        if equity >= peak {
            peak = equity;
            duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - equity) / peak * 100.0);
            duration += 1;
            max_duration = max_duration.max(duration);
        }
    }

    (max_dd, max_duration)
}

pub fn max_drawdown_pct(curve: &[f64]) -> f64 {
    compute_drawdown(curve).0
}

/// Starting equity followed by equity after each trade, in ledger order.
pub fn equity_curve(starting_equity: f64, trades: &[Trade]) -> Vec<f64> {
    let mut curve = Vec::with_capacity(trades.len() + 1);
    curve.push(starting_equity);
    let mut equity = starting_equity;
    for trade in trades {
        equity += trade.pnl;
        curve.push(equity);
    }
    curve
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodPnl {
    pub period: String,
    pub pnl: f64,
    pub trades: usize,
}

/// Net P&L per period, keyed on each trade's exit date, oldest first.
pub fn group_by_period(trades: &[Trade], period: Period) -> Vec<PeriodPnl> {
    let mut grouped: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for trade in trades {
        let entry = grouped
            .entry(period.label(trade.exit_time.date()))
            .or_insert((0.0, 0));
        entry.0 += trade.pnl;
        entry.1 += 1;
    }
    grouped
        .into_iter()
        .map(|(period, (pnl, trades))| PeriodPnl {
            period,
            pnl,
            trades,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodReturn {
    pub period: String,
    pub starting_equity: f64,
    pub pnl: f64,
    /// Fraction of `starting_equity`.
    pub return_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodStats {
    pub period: Period,
    pub returns: Vec<PeriodReturn>,
    pub mean_return: f64,
    pub stdev_return: f64,
    pub annualized_return: f64,
    /// `mean / stdev` of period returns; 0 with fewer than two periods or
    /// no variance.
    pub sharpe: f64,
    pub positive_periods: usize,
    pub worst: Option<PeriodReturn>,
    pub best: Option<PeriodReturn>,
}

impl PeriodStats {
    /// Each period's return is measured against the running equity at the
    /// start of that period.
    pub fn from_series(starting_equity: f64, series: &[PeriodPnl], period: Period) -> Self {
        let mut equity = starting_equity;
        let returns: Vec<PeriodReturn> = series
            .iter()
            .map(|p| {
                let start = equity;
                equity += p.pnl;
                PeriodReturn {
                    period: p.period.clone(),
                    starting_equity: start,
                    pnl: p.pnl,
                    return_pct: if start > 0.0 { p.pnl / start } else { 0.0 },
                }
            })
            .collect();

        let values: Vec<f64> = returns.iter().map(|r| r.return_pct).collect();
        let (mean_return, stdev_return) = mean_and_stdev(&values);
        let sharpe = if values.len() >= 2 && stdev_return > 0.0 {
            mean_return / stdev_return
        } else {
            0.0
        };

        let worst = returns
            .iter()
            .min_by(|a, b| a.return_pct.total_cmp(&b.return_pct))
            .cloned();
        let best = returns
            .iter()
            .max_by(|a, b| a.return_pct.total_cmp(&b.return_pct))
            .cloned();

        PeriodStats {
            period,
            positive_periods: values.iter().filter(|&&r| r > 0.0).count(),
            annualized_return: mean_return * period.periods_per_year(),
            returns,
            mean_return,
            stdev_return,
            sharpe,
            worst,
            best,
        }
    }
}

/// Mean and population standard deviation; zeros for an empty slice.
fn mean_and_stdev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Read-only summary of a run, recomputed from the ledger on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSnapshot {
    pub starting_equity: f64,
    pub ending_equity: f64,
    pub total_pnl: f64,
    /// Percent of starting equity.
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub max_drawdown_duration: usize,
    pub trades: TradeStats,
    pub periods: PeriodStats,
}

impl PerformanceSnapshot {
    /// Trades are taken in exit order.
    pub fn from_ledger(starting_equity: f64, trades: &[Trade], period: Period) -> Self {
        let mut ordered = trades.to_vec();
        ordered.sort_by_key(|t| t.exit_time);

        let curve = equity_curve(starting_equity, &ordered);
        let (max_drawdown_pct, max_drawdown_duration) = compute_drawdown(&curve);
        let ending_equity = curve.last().copied().unwrap_or(starting_equity);
        let total_pnl = ending_equity - starting_equity;
        let total_return_pct = if starting_equity > 0.0 {
            total_pnl / starting_equity * 100.0
        } else {
            0.0
        };
        let series = group_by_period(&ordered, period);

        PerformanceSnapshot {
            starting_equity,
            ending_equity,
            total_pnl,
            total_return_pct,
            max_drawdown_pct,
            max_drawdown_duration,
            trades: TradeStats::from_trades(&ordered),
            periods: PeriodStats::from_series(starting_equity, &series, period),
        }
    }
}
