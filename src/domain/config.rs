//! Typed run configuration.

use chrono::NaiveDate;

use super::commission::CommissionSchedule;
use super::config_validation::{parse_date, parse_time, validate_config};
use super::error::OrbError;
use super::metrics::Period;
use super::risk::{MarketFilter, RiskLimits};
use super::session::SessionHours;
use super::simulator::BreakoutParams;
use super::sizing::{LossStreakRule, PerformanceRule, SizingConfig, SizingLimits, VolatilityTiers};
use super::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;

/// Named base-risk presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskProfile {
    Conservative,
    Balanced,
    Growth,
    Aggressive,
}

impl RiskProfile {
    pub const ALL: [RiskProfile; 4] = [
        RiskProfile::Conservative,
        RiskProfile::Balanced,
        RiskProfile::Growth,
        RiskProfile::Aggressive,
    ];

    /// Fraction of equity risked per trade.
    pub fn base_risk(&self) -> f64 {
        match self {
            RiskProfile::Conservative => 0.02,
            RiskProfile::Balanced => 0.03,
            RiskProfile::Growth => 0.04,
            RiskProfile::Aggressive => 0.05,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RiskProfile::Conservative => "conservative",
            RiskProfile::Balanced => "balanced",
            RiskProfile::Growth => "growth",
            RiskProfile::Aggressive => "aggressive",
        }
    }
}

impl std::str::FromStr for RiskProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        RiskProfile::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown risk profile '{wanted}' (expected conservative, balanced, growth or aggressive)"
                )
            })
    }
}

impl std::fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    pub initial_capital: f64,
    pub symbols: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub period: Period,
    /// Used for dates the market port has no value for.
    pub default_volatility: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrbConfig {
    pub backtest: BacktestSettings,
    pub session: SessionHours,
    pub orb_minutes: u32,
    pub breakout: BreakoutParams,
    pub commission: CommissionSchedule,
    pub risk_profile: Option<RiskProfile>,
    pub sizing: SizingConfig,
    pub risk: RiskLimits,
    pub filter: MarketFilter,
}

impl OrbConfig {
    /// Default settings for everything but the universe and date range.
    pub fn with_defaults(symbols: Vec<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        OrbConfig {
            backtest: BacktestSettings {
                initial_capital: 100_000.0,
                symbols,
                start_date,
                end_date,
                period: Period::Month,
                default_volatility: 20.0,
            },
            session: SessionHours::default(),
            orb_minutes: 15,
            breakout: BreakoutParams::default(),
            commission: CommissionSchedule::default(),
            risk_profile: None,
            sizing: SizingConfig::default(),
            risk: RiskLimits::default(),
            filter: MarketFilter::default(),
        }
    }

    /// Switch to a named profile's base risk.
    pub fn with_risk_profile(mut self, profile: RiskProfile) -> Self {
        self.risk_profile = Some(profile);
        self.sizing.limits.base_risk_fraction = profile.base_risk();
        self
    }

    pub fn base_risk_pct(&self) -> f64 {
        self.sizing.limits.base_risk_fraction * 100.0
    }
}

/// Validate, then build the typed configuration.
///
/// An explicit `base_risk_per_trade` wins over `risk_profile`. One of the two
/// must be set.
pub fn load_config(config: &dyn ConfigPort) -> Result<OrbConfig, OrbError> {
    load_config_with_profile(config, None)
}

/// As [`load_config`], with a profile that overrides both sizing keys.
pub fn load_config_with_profile(
    config: &dyn ConfigPort,
    profile_override: Option<RiskProfile>,
) -> Result<OrbConfig, OrbError> {
    validate_config(config)?;

    let symbols_text = config
        .get_string("backtest", "symbols")
        .ok_or_else(|| OrbError::missing("backtest", "symbols"))?;
    let symbols = parse_symbols(&symbols_text)
        .map_err(|e| OrbError::invalid("backtest", "symbols", e.to_string()))?;

    let period = match config.get_string("backtest", "period") {
        Some(p) => p
            .parse::<Period>()
            .map_err(|reason| OrbError::invalid("backtest", "period", reason))?,
        None => Period::Month,
    };

    let backtest = BacktestSettings {
        initial_capital: config.get_double("backtest", "initial_capital", 100_000.0),
        symbols,
        start_date: parse_date(
            config.get_string("backtest", "start_date").as_deref(),
            "start_date",
        )?,
        end_date: parse_date(
            config.get_string("backtest", "end_date").as_deref(),
            "end_date",
        )?,
        period,
        default_volatility: config.get_double("backtest", "volatility_index", 20.0),
    };

    let session = SessionHours {
        open: parse_time(config, "open", "09:30")?,
        close: parse_time(config, "close", "16:00")?,
    };

    let breakout = BreakoutParams {
        breakout_buffer: config.get_double("strategy", "breakout_buffer", 0.001),
        stop_loss_pct: config.get_double("strategy", "stop_loss_pct", -0.01),
        take_profit_pct: config.get_double("strategy", "take_profit_pct", 0.03),
    };

    let commission = CommissionSchedule {
        per_share: config.get_double("commission", "per_share", 0.0035),
        base_fee: config.get_double("commission", "base_fee", 0.35),
        legs: as_u32(config.get_int("commission", "legs", 2)),
    };

    let file_profile = config
        .get_string("sizing", "risk_profile")
        .map(|p| p.parse::<RiskProfile>())
        .transpose()
        .map_err(|reason| OrbError::invalid("sizing", "risk_profile", reason))?;
    let explicit_risk = config
        .get_string("sizing", "base_risk_per_trade")
        .map(|_| config.get_double("sizing", "base_risk_per_trade", 0.0));
    let risk_profile = profile_override.or(file_profile);
    let base_risk_fraction = match (profile_override, explicit_risk, file_profile) {
        (Some(profile), _, _) => profile.base_risk(),
        (None, Some(fraction), _) => fraction,
        (None, None, Some(profile)) => profile.base_risk(),
        (None, None, None) => return Err(OrbError::missing("sizing", "base_risk_per_trade")),
    };

    let loss_streak = match config.get_string("sizing", "loss_steps") {
        Some(text) => LossStreakRule::parse(&text)
            .map_err(|reason| OrbError::invalid("sizing", "loss_steps", reason))?,
        None => LossStreakRule::default(),
    };

    let sizing = SizingConfig {
        limits: SizingLimits {
            base_risk_fraction,
            max_position_fraction: config.get_double("sizing", "max_position_pct", 0.10),
            min_position_value: config.get_double("sizing", "min_position_value", 1_000.0),
        },
        volatility: VolatilityTiers {
            below_20: config.get_double("sizing", "vol_below_20", 1.0),
            from_20_to_30: config.get_double("sizing", "vol_20_to_30", 0.85),
            from_30_to_40: config.get_double("sizing", "vol_30_to_40", 0.7),
            above_40: config.get_double("sizing", "vol_above_40", 0.5),
        },
        performance: PerformanceRule {
            lookback_days: config.get_int("sizing", "perf_lookback_days", 5).max(1) as usize,
            boost_threshold: config.get_double("sizing", "perf_boost_threshold", 0.02),
            boost: config.get_double("sizing", "perf_boost", 1.1),
            penalty_threshold: config.get_double("sizing", "perf_penalty_threshold", -0.01),
            penalty: config.get_double("sizing", "perf_penalty", 0.8),
        },
        loss_streak,
    };

    let risk = RiskLimits {
        daily_loss_warn: config.get_double("risk", "daily_loss_warn", 0.02),
        daily_loss_hard_stop: config.get_double("risk", "daily_loss_hard_stop", 0.03),
        max_consecutive_losses: as_u32(config.get_int("risk", "max_consecutive_losses", 5)),
        max_simultaneous_positions: as_u32(config.get_int("risk", "max_simultaneous_positions", 3)),
        max_daily_trades: as_u32(config.get_int("risk", "max_daily_trades", 6)),
    };

    let filter = MarketFilter {
        volatility_ceiling: if config.get_bool("risk", "volatility_filter", true) {
            Some(config.get_double("risk", "volatility_ceiling", 45.0))
        } else {
            None
        },
        skip_first_minutes: config.get_int("risk", "skip_first_minutes", 15),
        skip_last_minutes: config.get_int("risk", "skip_last_minutes", 30),
    };

    Ok(OrbConfig {
        backtest,
        session,
        orb_minutes: as_u32(config.get_int("session", "orb_minutes", 15)),
        breakout,
        commission,
        risk_profile,
        sizing,
        risk,
        filter,
    })
}

// Range already checked by validation.
fn as_u32(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
