//! Risk-based position sizing.
//!
//! The risk budget is `equity × base_risk_fraction`, scaled by the product of
//! an ordered list of [`SizingRule`] multipliers. Shares follow from the stop
//! distance and are then bounded by the absolute position limits. Sizing is
//! a pure function of the account, the market context and the prices.

use tracing::debug;

use super::account::AccountState;
use super::market::MarketContext;

/// One independent adjustment to the risk budget.
pub trait SizingRule: std::fmt::Debug {
    fn name(&self) -> &'static str;
    fn multiplier(&self, account: &AccountState, market: &MarketContext) -> f64;
}

/// Multiplier by volatility-index tier: `< 20`, `20..=30`, `(30, 40]`, `> 40`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilityTiers {
    pub below_20: f64,
    pub from_20_to_30: f64,
    pub from_30_to_40: f64,
    pub above_40: f64,
}

impl Default for VolatilityTiers {
    fn default() -> Self {
        VolatilityTiers {
            below_20: 1.0,
            from_20_to_30: 0.85,
            from_30_to_40: 0.7,
            above_40: 0.5,
        }
    }
}

impl SizingRule for VolatilityTiers {
    fn name(&self) -> &'static str {
        "volatility"
    }

    fn multiplier(&self, _account: &AccountState, market: &MarketContext) -> f64 {
        let level = market.volatility_index;
        if level < 20.0 {
            self.below_20
        } else if level <= 30.0 {
            self.from_20_to_30
        } else if level <= 40.0 {
            self.from_30_to_40
        } else {
            self.above_40
        }
    }
}

/// Boost after a strong run of daily returns, penalize after a weak one.
///
/// Neutral until `lookback_days` returns are on record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceRule {
    pub lookback_days: usize,
    pub boost_threshold: f64,
    pub boost: f64,
    pub penalty_threshold: f64,
    pub penalty: f64,
}

impl Default for PerformanceRule {
    fn default() -> Self {
        PerformanceRule {
            lookback_days: 5,
            boost_threshold: 0.02,
            boost: 1.1,
            penalty_threshold: -0.01,
            penalty: 0.8,
        }
    }
}

impl SizingRule for PerformanceRule {
    fn name(&self) -> &'static str {
        "performance"
    }

    fn multiplier(&self, account: &AccountState, _market: &MarketContext) -> f64 {
        let Some(returns) = account.trailing_returns(self.lookback_days) else {
            return 1.0;
        };
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        if mean > self.boost_threshold {
            self.boost
        } else if mean < self.penalty_threshold {
            self.penalty
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossStep {
    pub min_losses: u32,
    pub multiplier: f64,
}

/// Step-down by consecutive losses. The deepest step reached applies.
#[derive(Debug, Clone, PartialEq)]
pub struct LossStreakRule {
    steps: Vec<LossStep>,
}

impl Default for LossStreakRule {
    fn default() -> Self {
        LossStreakRule::new(vec![
            LossStep {
                min_losses: 2,
                multiplier: 0.7,
            },
            LossStep {
                min_losses: 3,
                multiplier: 0.5,
            },
        ])
    }
}

impl LossStreakRule {
    pub fn new(mut steps: Vec<LossStep>) -> Self {
        steps.sort_by_key(|s| s.min_losses);
        LossStreakRule { steps }
    }

    pub fn steps(&self) -> &[LossStep] {
        &self.steps
    }

    /// Parse `"2:0.7,3:0.5"` (losses:multiplier pairs).
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut steps = Vec::new();
        for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (losses, mult) = part
                .split_once(':')
                .ok_or_else(|| format!("expected losses:multiplier, got '{part}'"))?;
            let min_losses = losses
                .trim()
                .parse::<u32>()
                .map_err(|e| format!("bad loss count '{losses}': {e}"))?;
            let multiplier = mult
                .trim()
                .parse::<f64>()
                .map_err(|e| format!("bad multiplier '{mult}': {e}"))?;
            steps.push(LossStep {
                min_losses,
                multiplier,
            });
        }
        Ok(LossStreakRule::new(steps))
    }
}

impl SizingRule for LossStreakRule {
    fn name(&self) -> &'static str {
        "loss_streak"
    }

    fn multiplier(&self, account: &AccountState, _market: &MarketContext) -> f64 {
        self.steps
            .iter()
            .rev()
            .find(|s| account.consecutive_losses >= s.min_losses)
            .map_or(1.0, |s| s.multiplier)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingLimits {
    pub base_risk_fraction: f64,
    pub max_position_fraction: f64,
    pub min_position_value: f64,
}

impl Default for SizingLimits {
    fn default() -> Self {
        SizingLimits {
            base_risk_fraction: 0.02,
            max_position_fraction: 0.10,
            min_position_value: 1_000.0,
        }
    }
}

/// Everything needed to build the standard rule stack.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SizingConfig {
    pub limits: SizingLimits,
    pub volatility: VolatilityTiers,
    pub performance: PerformanceRule,
    pub loss_streak: LossStreakRule,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedMultiplier {
    pub rule: &'static str,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizingResult {
    pub base_risk: f64,
    pub adjusted_risk: f64,
    pub multipliers: Vec<AppliedMultiplier>,
    /// Zero means no trade.
    pub shares: u64,
    pub position_value: f64,
}

impl SizingResult {
    pub fn combined_multiplier(&self) -> f64 {
        self.multipliers.iter().map(|m| m.value).product()
    }

    pub fn is_tradeable(&self) -> bool {
        self.shares > 0
    }
}

#[derive(Debug)]
pub struct PositionSizer {
    pub limits: SizingLimits,
    rules: Vec<Box<dyn SizingRule>>,
}

impl PositionSizer {
    /// A sizer with no adjustment rules.
    pub fn new(limits: SizingLimits) -> Self {
        PositionSizer {
            limits,
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: impl SizingRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Volatility, performance and loss-streak rules, in that order.
    pub fn standard(config: &SizingConfig) -> Self {
        PositionSizer::new(config.limits)
            .with_rule(config.volatility)
            .with_rule(config.performance)
            .with_rule(config.loss_streak.clone())
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn size(
        &self,
        account: &AccountState,
        market: &MarketContext,
        entry: f64,
        stop: f64,
    ) -> SizingResult {
        let base_risk = account.equity * self.limits.base_risk_fraction;
        let multipliers: Vec<AppliedMultiplier> = self
            .rules
            .iter()
            .map(|rule| AppliedMultiplier {
                rule: rule.name(),
                value: rule.multiplier(account, market),
            })
            .collect();
        let combined: f64 = multipliers.iter().map(|m| m.value).product();
        let adjusted_risk = (base_risk * combined).max(0.0);
        let shares = share_count(adjusted_risk, entry, stop, account.equity, &self.limits);
        let position_value = shares as f64 * entry;

        debug!(
            base_risk,
            combined,
            adjusted_risk,
            shares,
            position_value,
            "position sized"
        );

        SizingResult {
            base_risk,
            adjusted_risk,
            multipliers,
            shares,
            position_value,
        }
    }
}

/// Shares for a risk budget, bounded by the position limits. Returns 0 for
/// any degenerate input (non-positive prices or equity, zero stop distance).
pub fn share_count(
    adjusted_risk: f64,
    entry: f64,
    stop: f64,
    equity: f64,
    limits: &SizingLimits,
) -> u64 {
    let distance = (entry - stop).abs();
    let valid = entry.is_finite()
        && entry > 0.0
        && distance.is_finite()
        && distance > 0.0
        && adjusted_risk.is_finite()
        && adjusted_risk > 0.0
        && equity.is_finite()
        && equity > 0.0;
    if !valid {
        return 0;
    }

    let cap = (equity * limits.max_position_fraction / entry).floor().max(0.0);
    let mut shares = (adjusted_risk / distance).floor().min(cap);

    if shares > 0.0 && shares * entry < limits.min_position_value {
        let floor_shares = (limits.min_position_value / entry).floor();
        shares = shares.max(floor_shares).min(cap);
    }

    if shares >= 1.0 { shares as u64 } else { 0 }
}
