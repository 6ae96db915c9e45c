//! Risk gatekeeper: ordered admission checks for new entries.
//!
//! The gate only denies new entries. It never closes open positions and
//! never mutates the account.

use tracing::info;

use super::account::AccountState;
use super::market::MarketContext;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskLimits {
    /// Fraction of equity; crossing it logs a warning only.
    pub daily_loss_warn: f64,
    /// Fraction of equity; reaching it halts entries for the day.
    pub daily_loss_hard_stop: f64,
    pub max_consecutive_losses: u32,
    pub max_simultaneous_positions: u32,
    pub max_daily_trades: u32,
}

impl Default for RiskLimits {
    fn default() -> Self {
        RiskLimits {
            daily_loss_warn: 0.02,
            daily_loss_hard_stop: 0.03,
            max_consecutive_losses: 5,
            max_simultaneous_positions: 3,
            max_daily_trades: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketFilter {
    /// `None` disables the ceiling.
    pub volatility_ceiling: Option<f64>,
    pub skip_first_minutes: i64,
    pub skip_last_minutes: i64,
}

impl Default for MarketFilter {
    fn default() -> Self {
        MarketFilter {
            volatility_ceiling: Some(45.0),
            skip_first_minutes: 15,
            skip_last_minutes: 30,
        }
    }
}

/// How long a block lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockScope {
    /// No further entries today.
    Day,
    /// Only this candidate is rejected; scanning continues.
    Candidate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockReason {
    DailyLossLimit { fraction: f64 },
    ConsecutiveLosses { count: u32 },
    MaxOpenPositions { open: u32 },
    MaxDailyTrades { trades: u32 },
    VolatilityCeiling { level: f64 },
    OpeningWindow { minutes_since_open: i64 },
    ClosingWindow { minutes_until_close: i64 },
}

impl BlockReason {
    pub fn scope(&self) -> BlockScope {
        match self {
            BlockReason::DailyLossLimit { .. }
            | BlockReason::ConsecutiveLosses { .. }
            | BlockReason::MaxDailyTrades { .. }
            | BlockReason::VolatilityCeiling { .. } => BlockScope::Day,
            BlockReason::MaxOpenPositions { .. }
            | BlockReason::OpeningWindow { .. }
            | BlockReason::ClosingWindow { .. } => BlockScope::Candidate,
        }
    }
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::DailyLossLimit { fraction } => {
                write!(f, "daily loss limit reached ({:.2}%)", fraction * 100.0)
            }
            BlockReason::ConsecutiveLosses { count } => {
                write!(f, "consecutive loss limit reached ({count})")
            }
            BlockReason::MaxOpenPositions { open } => write!(f, "maximum positions open ({open})"),
            BlockReason::MaxDailyTrades { trades } => write!(f, "daily trade limit reached ({trades})"),
            BlockReason::VolatilityCeiling { level } => {
                write!(f, "volatility index too high ({level:.1})")
            }
            BlockReason::OpeningWindow { minutes_since_open } => {
                write!(f, "inside opening window ({minutes_since_open} min after open)")
            }
            BlockReason::ClosingWindow { minutes_until_close } => {
                write!(f, "inside closing window ({minutes_until_close} min before close)")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    Allow,
    Block(BlockReason),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RiskGatekeeper {
    pub limits: RiskLimits,
    pub filter: MarketFilter,
}

impl RiskGatekeeper {
    pub fn new(limits: RiskLimits, filter: MarketFilter) -> Self {
        RiskGatekeeper { limits, filter }
    }

    /// Run the gates in order; the first failure decides.
    pub fn check(&self, account: &AccountState, market: &MarketContext) -> GateDecision {
        let decision = self
            .daily_loss(account)
            .or_else(|| self.consecutive_losses(account))
            .or_else(|| self.open_positions(account))
            .or_else(|| self.daily_trades(account))
            .or_else(|| self.market_conditions(market))
            .map_or(GateDecision::Allow, GateDecision::Block);

        if let GateDecision::Block(reason) = decision {
            info!(%reason, scope = ?reason.scope(), "entry blocked");
        }
        decision
    }

    /// True once a losing day has crossed the warning tier. Informational
    /// only; entries stay allowed until the hard stop.
    pub fn daily_loss_warning(&self, account: &AccountState) -> bool {
        account.daily_pnl < 0.0 && account.daily_pnl_fraction() >= self.limits.daily_loss_warn
    }

    fn daily_loss(&self, account: &AccountState) -> Option<BlockReason> {
        let fraction = account.daily_pnl_fraction();
        (fraction >= self.limits.daily_loss_hard_stop)
            .then_some(BlockReason::DailyLossLimit { fraction })
    }

    fn consecutive_losses(&self, account: &AccountState) -> Option<BlockReason> {
        (account.consecutive_losses >= self.limits.max_consecutive_losses).then_some(
            BlockReason::ConsecutiveLosses {
                count: account.consecutive_losses,
            },
        )
    }

    fn open_positions(&self, account: &AccountState) -> Option<BlockReason> {
        (account.open_positions >= self.limits.max_simultaneous_positions).then_some(
            BlockReason::MaxOpenPositions {
                open: account.open_positions,
            },
        )
    }

    fn daily_trades(&self, account: &AccountState) -> Option<BlockReason> {
        (account.trades_today >= self.limits.max_daily_trades).then_some(
            BlockReason::MaxDailyTrades {
                trades: account.trades_today,
            },
        )
    }

    fn market_conditions(&self, market: &MarketContext) -> Option<BlockReason> {
        if let Some(ceiling) = self.filter.volatility_ceiling {
            if market.volatility_index > ceiling {
                return Some(BlockReason::VolatilityCeiling {
                    level: market.volatility_index,
                });
            }
        }
        if market.minutes_since_open < self.filter.skip_first_minutes {
            return Some(BlockReason::OpeningWindow {
                minutes_since_open: market.minutes_since_open,
            });
        }
        if market.minutes_until_close < self.filter.skip_last_minutes {
            return Some(BlockReason::ClosingWindow {
                minutes_until_close: market.minutes_until_close,
            });
        }
        None
    }
}
