//! Configuration validation.
//!
//! Every field is checked before a run starts; a malformed configuration is
//! the only fatal error class. A value that is present but does not parse as
//! its type is rejected here, never replaced by the default.

use chrono::{NaiveDate, NaiveTime};

use crate::domain::config::RiskProfile;
use crate::domain::error::OrbError;
use crate::domain::metrics::Period;
use crate::domain::sizing::LossStreakRule;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), OrbError> {
    validate_backtest_config(config)?;
    validate_session_config(config)?;
    validate_strategy_config(config)?;
    validate_commission_config(config)?;
    validate_sizing_config(config)?;
    validate_risk_config(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), OrbError> {
    validate_initial_capital(config)?;
    validate_symbols(config)?;
    validate_dates(config)?;
    validate_period(config)?;
    validate_non_negative(config, "backtest", "volatility_index", 20.0)?;
    Ok(())
}

pub fn validate_session_config(config: &dyn ConfigPort) -> Result<(), OrbError> {
    let open = parse_time(config, "open", "09:30")?;
    let close = parse_time(config, "close", "16:00")?;
    if open >= close {
        return Err(OrbError::invalid("session", "open", "open must be before close"));
    }
    let session_minutes = (close - open).num_minutes();
    let orb = read_int(config, "session", "orb_minutes", 15)?;
    if orb <= 0 || orb >= session_minutes {
        return Err(OrbError::invalid(
            "session",
            "orb_minutes",
            format!("orb_minutes must be between 1 and {}", session_minutes - 1),
        ));
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), OrbError> {
    validate_non_negative(config, "strategy", "breakout_buffer", 0.001)?;

    let stop = read_double(config, "strategy", "stop_loss_pct", -0.01)?;
    if stop >= 0.0 || stop <= -1.0 {
        return Err(OrbError::invalid(
            "strategy",
            "stop_loss_pct",
            "stop_loss_pct must be negative and above -1 (stop below entry)",
        ));
    }
    let target = read_double(config, "strategy", "take_profit_pct", 0.03)?;
    if !target.is_finite() || target <= 0.0 {
        return Err(OrbError::invalid(
            "strategy",
            "take_profit_pct",
            "take_profit_pct must be positive",
        ));
    }
    Ok(())
}

pub fn validate_commission_config(config: &dyn ConfigPort) -> Result<(), OrbError> {
    validate_non_negative(config, "commission", "per_share", 0.0035)?;
    validate_non_negative(config, "commission", "base_fee", 0.35)?;
    validate_count(config, "commission", "legs", 2)?;
    Ok(())
}

/// Checks the values that are present. Whether a base risk is available at
/// all depends on a command-line profile too, so `load_config` reports a
/// missing one.
pub fn validate_sizing_config(config: &dyn ConfigPort) -> Result<(), OrbError> {
    if let Some(profile) = config.get_string("sizing", "risk_profile") {
        profile
            .parse::<RiskProfile>()
            .map_err(|reason| OrbError::invalid("sizing", "risk_profile", reason))?;
    }
    if config.get_string("sizing", "base_risk_per_trade").is_some() {
        validate_fraction(config, "sizing", "base_risk_per_trade", 0.02)?;
    }
    validate_fraction(config, "sizing", "max_position_pct", 0.10)?;
    validate_non_negative(config, "sizing", "min_position_value", 1_000.0)?;

    for (key, default) in [
        ("vol_below_20", 1.0),
        ("vol_20_to_30", 0.85),
        ("vol_30_to_40", 0.7),
        ("vol_above_40", 0.5),
        ("perf_boost", 1.1),
        ("perf_penalty", 0.8),
    ] {
        validate_positive(config, "sizing", key, default)?;
    }

    let lookback = read_int(config, "sizing", "perf_lookback_days", 5)?;
    if !(1..=30).contains(&lookback) {
        return Err(OrbError::invalid(
            "sizing",
            "perf_lookback_days",
            "perf_lookback_days must be between 1 and 30",
        ));
    }

    let boost_threshold = read_double(config, "sizing", "perf_boost_threshold", 0.02)?;
    let penalty_threshold = read_double(config, "sizing", "perf_penalty_threshold", -0.01)?;
    if penalty_threshold >= boost_threshold {
        return Err(OrbError::invalid(
            "sizing",
            "perf_penalty_threshold",
            "perf_penalty_threshold must be below perf_boost_threshold",
        ));
    }

    validate_loss_steps(config)?;
    Ok(())
}

pub fn validate_risk_config(config: &dyn ConfigPort) -> Result<(), OrbError> {
    let warn = validate_fraction(config, "risk", "daily_loss_warn", 0.02)?;
    let hard = validate_fraction(config, "risk", "daily_loss_hard_stop", 0.03)?;
    if hard < warn {
        return Err(OrbError::invalid(
            "risk",
            "daily_loss_hard_stop",
            "daily_loss_hard_stop must not be below daily_loss_warn",
        ));
    }
    validate_count(config, "risk", "max_consecutive_losses", 5)?;
    validate_count(config, "risk", "max_simultaneous_positions", 3)?;
    validate_count(config, "risk", "max_daily_trades", 6)?;
    read_bool(config, "risk", "volatility_filter", true)?;
    validate_positive(config, "risk", "volatility_ceiling", 45.0)?;

    for (key, default) in [("skip_first_minutes", 15), ("skip_last_minutes", 30)] {
        if read_int(config, "risk", key, default)? < 0 {
            return Err(OrbError::invalid("risk", key, format!("{key} must be non-negative")));
        }
    }
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), OrbError> {
    let value = read_double(config, "backtest", "initial_capital", 100_000.0)?;
    if !value.is_finite() || value <= 0.0 {
        return Err(OrbError::invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), OrbError> {
    match config.get_string("backtest", "symbols") {
        Some(s) if !s.trim().is_empty() => parse_symbols(&s)
            .map(|_| ())
            .map_err(|e| OrbError::invalid("backtest", "symbols", e.to_string())),
        _ => Err(OrbError::missing("backtest", "symbols")),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), OrbError> {
    let start = parse_date(config.get_string("backtest", "start_date").as_deref(), "start_date")?;
    let end = parse_date(config.get_string("backtest", "end_date").as_deref(), "end_date")?;
    if start > end {
        return Err(OrbError::invalid(
            "backtest",
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    Ok(())
}

fn validate_period(config: &dyn ConfigPort) -> Result<(), OrbError> {
    if let Some(value) = config.get_string("backtest", "period") {
        value
            .parse::<Period>()
            .map_err(|reason| OrbError::invalid("backtest", "period", reason))?;
    }
    Ok(())
}

fn validate_loss_steps(config: &dyn ConfigPort) -> Result<(), OrbError> {
    let Some(text) = config.get_string("sizing", "loss_steps") else {
        return Ok(());
    };
    let rule = LossStreakRule::parse(&text)
        .map_err(|reason| OrbError::invalid("sizing", "loss_steps", reason))?;

    let mut previous = 1.0_f64;
    for step in rule.steps() {
        if step.min_losses == 0 || step.multiplier <= 0.0 || step.multiplier > 1.0 {
            return Err(OrbError::invalid(
                "sizing",
                "loss_steps",
                "each step needs a loss count of at least 1 and a multiplier in (0, 1]",
            ));
        }
        if step.multiplier > previous {
            return Err(OrbError::invalid(
                "sizing",
                "loss_steps",
                "multipliers must not increase with the loss count",
            ));
        }
        previous = step.multiplier;
    }
    Ok(())
}

fn validate_positive(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, OrbError> {
    let value = read_double(config, section, key, default)?;
    if !value.is_finite() || value <= 0.0 {
        return Err(OrbError::invalid(section, key, format!("{key} must be positive")));
    }
    Ok(value)
}

fn validate_non_negative(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, OrbError> {
    let value = read_double(config, section, key, default)?;
    if !value.is_finite() || value < 0.0 {
        return Err(OrbError::invalid(section, key, format!("{key} must be non-negative")));
    }
    Ok(value)
}

/// A fraction in `(0, 1]`.
fn validate_fraction(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, OrbError> {
    let value = read_double(config, section, key, default)?;
    if !(value > 0.0 && value <= 1.0) {
        return Err(OrbError::invalid(
            section,
            key,
            format!("{key} must be in (0, 1]"),
        ));
    }
    Ok(value)
}

fn validate_count(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<u32, OrbError> {
    let value = read_int(config, section, key, default)?;
    u32::try_from(value)
        .ok()
        .filter(|v| *v >= 1)
        .ok_or_else(|| OrbError::invalid(section, key, format!("{key} must be at least 1")))
}

/// The raw value parsed as `f64`, or `default` when the key is unset.
fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, OrbError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(text) => text.trim().parse::<f64>().map_err(|_| {
            OrbError::invalid(section, key, format!("{key} must be a number, got '{text}'"))
        }),
    }
}

fn read_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, OrbError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(text) => text.trim().parse::<i64>().map_err(|_| {
            OrbError::invalid(
                section,
                key,
                format!("{key} must be a whole number, got '{text}'"),
            )
        }),
    }
}

fn read_bool(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: bool,
) -> Result<bool, OrbError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(text) => parse_bool(&text).ok_or_else(|| {
            OrbError::invalid(
                section,
                key,
                format!("{key} must be true/false, yes/no, on/off or 1/0, got '{text}'"),
            )
        }),
    }
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

pub(crate) fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, OrbError> {
    match value {
        None => Err(OrbError::missing("backtest", field)),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            OrbError::invalid(
                "backtest",
                field,
                format!("invalid {field} format, expected YYYY-MM-DD"),
            )
        }),
    }
}

pub(crate) fn parse_time(
    config: &dyn ConfigPort,
    key: &str,
    default: &str,
) -> Result<NaiveTime, OrbError> {
    let value = config
        .get_string("session", key)
        .unwrap_or_else(|| default.to_string());
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| {
        OrbError::invalid("session", key, format!("invalid {key} time '{value}', expected HH:MM"))
    })
}
