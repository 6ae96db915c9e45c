//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvAdapter, CsvLedgerWriter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::synthetic_adapter::SyntheticAdapter;
use crate::adapters::volatility_adapter::{ConstantVolatility, CsvVolatilityAdapter};
use crate::domain::backtest::{BacktestResult, Engine};
use crate::domain::config::{OrbConfig, RiskProfile, load_config_with_profile};
use crate::domain::error::OrbError;
use crate::domain::metrics::{PerformanceSnapshot, Period};
use crate::domain::risk_levels::{
    DEFAULT_RISK_LEVELS, analyze_risk_levels, best_by_return, best_by_sharpe,
};
use crate::domain::trade::ExitReason;
use crate::ports::data_port::DataPort;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::market_port::MarketPort;

#[derive(Parser, Debug)]
#[command(name = "orbtrader", about = "Opening-range breakout backtester")]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Where bars and volatility levels come from.
#[derive(Args, Debug, Clone, Default)]
pub struct DataArgs {
    /// Directory of {SYMBOL}_{YYYY-MM-DD}.csv bar files
    #[arg(long, conflicts_with = "synthetic")]
    pub data_dir: Option<PathBuf>,
    /// Generate seeded random-walk bars instead of reading files
    #[arg(long)]
    pub synthetic: bool,
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// date,level CSV of daily volatility index values
    #[arg(long)]
    pub volatility_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[command(flatten)]
        data: DataArgs,
        #[arg(long)]
        risk_profile: Option<RiskProfile>,
        /// Write trades.csv and periods.csv here
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Compare results across base-risk levels
    RiskLevels {
        #[arg(short, long)]
        config: PathBuf,
        #[command(flatten)]
        data: DataArgs,
        #[arg(long)]
        risk_profile: Option<RiskProfile>,
        /// Comma-separated percent levels, e.g. 1.5,2,3
        #[arg(long)]
        levels: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            risk_profile,
            output_dir,
        } => run_backtest(&config, &data, risk_profile, output_dir.as_ref()),
        Command::Validate { config } => run_validate(&config),
        Command::RiskLevels {
            config,
            data,
            risk_profile,
            levels,
        } => run_risk_levels(&config, &data, risk_profile, levels.as_deref()),
    }
}

/// Load, validate and type the configuration, printing any error.
pub fn load_orb_config(path: &PathBuf, profile: Option<RiskProfile>) -> Result<OrbConfig, ExitCode> {
    let report = |e: OrbError| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    };
    let adapter = FileConfigAdapter::from_file(path).map_err(report)?;
    load_config_with_profile(&adapter, profile).map_err(report)
}

/// Bars from files or the synthetic generator; volatility from a file, the
/// generator, or the configured constant.
pub fn build_ports(
    data: &DataArgs,
    config: &OrbConfig,
) -> Result<(Box<dyn DataPort>, Box<dyn MarketPort>), OrbError> {
    let bars: Box<dyn DataPort> = match (&data.data_dir, data.synthetic) {
        (Some(dir), _) => Box::new(CsvAdapter::new(dir.clone())),
        (None, true) => Box::new(SyntheticAdapter::new(data.seed, config.session)),
        (None, false) => {
            return Err(OrbError::invalid(
                "cli",
                "data-dir",
                "either --data-dir or --synthetic is required",
            ));
        }
    };

    let market: Box<dyn MarketPort> = match &data.volatility_file {
        Some(path) => Box::new(CsvVolatilityAdapter::from_file(path)?),
        None if data.synthetic => Box::new(SyntheticAdapter::new(data.seed, config.session)),
        None => Box::new(ConstantVolatility(config.backtest.default_volatility)),
    };
    Ok((bars, market))
}

/// Run the configured date range with the given ports.
pub fn execute(config: &OrbConfig, data: &dyn DataPort, market: &dyn MarketPort) -> BacktestResult {
    Engine::new(config, data, market).run_configured()
}

fn prepare(
    config_path: &PathBuf,
    data: &DataArgs,
    profile: Option<RiskProfile>,
) -> Result<(OrbConfig, BacktestResult), ExitCode> {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let config = load_orb_config(config_path, profile)?;

    // Stage 2: Wire data sources
    let (bars, market) = build_ports(data, &config).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;

    // Stage 3: Simulate
    eprintln!(
        "Running backtest: {} symbols, {} to {} at {:.2}% base risk",
        config.backtest.symbols.len(),
        config.backtest.start_date,
        config.backtest.end_date,
        config.base_risk_pct(),
    );
    let result = execute(&config, bars.as_ref(), market.as_ref());
    eprintln!(
        "  Processed: {} days, {} symbol-days skipped",
        result.days.len(),
        result.skipped_symbol_days()
    );
    Ok((config, result))
}

fn run_backtest(
    config_path: &PathBuf,
    data: &DataArgs,
    profile: Option<RiskProfile>,
    output_dir: Option<&PathBuf>,
) -> ExitCode {
    let (config, result) = match prepare(config_path, data, profile) {
        Ok(r) => r,
        Err(code) => return code,
    };

    let snapshot = result.snapshot(config.backtest.period);
    print_summary(&snapshot);

    let Some(dir) = output_dir else {
        return ExitCode::SUCCESS;
    };
    let writer = CsvLedgerWriter::new(dir.clone());
    match write_ledger(&writer, &result, &snapshot) {
        Ok(()) => {
            eprintln!("\nLedger written to: {}", dir.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn write_ledger(
    ledger: &dyn LedgerPort,
    result: &BacktestResult,
    snapshot: &PerformanceSnapshot,
) -> Result<(), OrbError> {
    ledger.write_trades(&result.trades)?;
    ledger.write_periods(&snapshot.periods.returns)
}

pub fn print_summary(snapshot: &PerformanceSnapshot) {
    let stats = &snapshot.trades;
    let periods = &snapshot.periods;

    eprintln!("\n=== Results ===");
    eprintln!("Starting Equity:  ${:.2}", snapshot.starting_equity);
    eprintln!("Ending Equity:    ${:.2}", snapshot.ending_equity);
    eprintln!("Total Return:     {:.2}%", snapshot.total_return_pct);
    eprintln!("Annualized:       {:.2}%", periods.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", periods.sharpe);
    eprintln!(
        "Max Drawdown:     -{:.2}% ({} trades)",
        snapshot.max_drawdown_pct, snapshot.max_drawdown_duration
    );
    eprintln!("Total Trades:     {}", stats.total_trades);
    eprintln!("Win Rate:         {:.1}%", stats.win_rate);
    match stats.profit_factor {
        Some(pf) => eprintln!("Profit Factor:    {pf:.2}"),
        None => eprintln!("Profit Factor:    n/a (no losing trades)"),
    }
    eprintln!("Avg Win / Loss:   ${:.2} / ${:.2}", stats.avg_win, stats.avg_loss);
    eprintln!(
        "Largest Win/Loss: ${:.2} / ${:.2}",
        stats.largest_win, stats.largest_loss
    );
    eprintln!("Max Loss Streak:  {}", stats.max_consecutive_losses);
    eprintln!("Avg Hold:         {:.1} min", stats.avg_hold_minutes);
    eprintln!("Commission:       ${:.2}", stats.total_commission);

    if stats.total_trades > 0 {
        eprintln!("\n=== Exits ===");
        for reason in ExitReason::ALL {
            eprintln!("  {:<7} {}", reason.as_str(), stats.exits.count(reason));
        }
    }

    if !periods.returns.is_empty() {
        let heading = match periods.period {
            Period::Day => "Daily",
            Period::Month => "Monthly",
        };
        eprintln!("\n=== {heading} Returns ===");
        for p in &periods.returns {
            let sign = if p.pnl >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {}:  {}{:.2}%  {}${:.0}",
                p.period,
                sign,
                p.return_pct * 100.0,
                sign,
                p.pnl
            );
        }
        eprintln!(
            "  positive: {}/{}",
            periods.positive_periods,
            periods.returns.len()
        );
        if let Some(worst) = &periods.worst {
            eprintln!("  worst:    {} ({:.2}%)", worst.period, worst.return_pct * 100.0);
        }
    }
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_orb_config(config_path, None) {
        Ok(c) => c,
        Err(code) => return code,
    };

    eprintln!("\nUniverse:");
    eprintln!("  symbols: {}", config.backtest.symbols.join(", "));
    eprintln!(
        "  dates:   {} to {}",
        config.backtest.start_date, config.backtest.end_date
    );
    eprintln!("\nStrategy:");
    eprintln!(
        "  session {}-{}, opening range {} min",
        config.session.open.format("%H:%M"),
        config.session.close.format("%H:%M"),
        config.orb_minutes
    );
    eprintln!(
        "  buffer {:.3}%, stop {:.2}%, target {:.2}%",
        config.breakout.breakout_buffer * 100.0,
        config.breakout.stop_loss_pct * 100.0,
        config.breakout.take_profit_pct * 100.0
    );
    eprintln!("\nSizing:");
    match config.risk_profile {
        Some(p) => eprintln!("  base risk {:.2}% ({p})", config.base_risk_pct()),
        None => eprintln!("  base risk {:.2}%", config.base_risk_pct()),
    }
    eprintln!(
        "  max position {:.0}% of equity, min ${:.0}",
        config.sizing.limits.max_position_fraction * 100.0,
        config.sizing.limits.min_position_value
    );
    eprintln!("\nRisk:");
    eprintln!(
        "  daily loss warn {:.1}%, hard stop {:.1}%",
        config.risk.daily_loss_warn * 100.0,
        config.risk.daily_loss_hard_stop * 100.0
    );
    eprintln!(
        "  max positions {}, max daily trades {}, max loss streak {}",
        config.risk.max_simultaneous_positions,
        config.risk.max_daily_trades,
        config.risk.max_consecutive_losses
    );

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

/// Parse a comma-separated list of positive percent levels.
pub fn parse_levels(text: &str) -> Result<Vec<f64>, String> {
    text.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v > 0.0)
                .ok_or_else(|| format!("invalid risk level '{t}'"))
        })
        .collect::<Result<Vec<_>, _>>()
        .and_then(|levels| {
            if levels.is_empty() {
                Err("no risk levels given".to_string())
            } else {
                Ok(levels)
            }
        })
}

fn run_risk_levels(
    config_path: &PathBuf,
    data: &DataArgs,
    profile: Option<RiskProfile>,
    levels: Option<&str>,
) -> ExitCode {
    let levels = match levels.map(parse_levels).transpose() {
        Ok(l) => l.unwrap_or_else(|| DEFAULT_RISK_LEVELS.to_vec()),
        Err(reason) => {
            eprintln!("error: {reason}");
            return ExitCode::from(2);
        }
    };

    let (config, result) = match prepare(config_path, data, profile) {
        Ok(r) => r,
        Err(code) => return code,
    };

    let results = analyze_risk_levels(
        &result.trades,
        config.base_risk_pct(),
        &levels,
        result.initial_capital,
        &config.commission,
        config.backtest.period,
    );

    eprintln!("\n=== Risk Levels ===");
    eprintln!(
        "  {:>6}  {:>9}  {:>10}  {:>7}  {:>7}  {:>6}",
        "risk", "return", "annual", "max dd", "sharpe", "trades"
    );
    for r in &results {
        let s = &r.snapshot;
        eprintln!(
            "  {:>5.1}%  {:>8.2}%  {:>9.2}%  {:>6.2}%  {:>7.2}  {:>6}",
            r.risk_pct,
            s.total_return_pct,
            s.periods.annualized_return * 100.0,
            s.max_drawdown_pct,
            s.periods.sharpe,
            s.trades.total_trades
        );
    }
    if let Some(best) = best_by_return(&results) {
        eprintln!("\nBest annualized return: {:.1}%", best.risk_pct);
    }
    if let Some(best) = best_by_sharpe(&results) {
        eprintln!("Best risk-adjusted:     {:.1}%", best.risk_pct);
    }
    ExitCode::SUCCESS
}
