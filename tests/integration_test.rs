//! Integration tests for the day-by-day engine.
//!
//! Tests cover:
//! - End-to-end STOP exit sized at the configured risk
//! - Simultaneous-position limit across symbols, released by a close
//! - Per-symbol data failures isolated from the rest of the universe
//! - Daily-loss hard stop and loss-streak cooling off across days
//! - Ledger-derived performance snapshot
//! - Seeded synthetic runs

mod common;

use approx::assert_relative_eq;
use common::*;
use orbtrader::adapters::synthetic_adapter::SyntheticAdapter;
use orbtrader::domain::account::AccountState;
use orbtrader::domain::backtest::{Engine, SkipReason};
use orbtrader::domain::metrics::Period;
use orbtrader::domain::risk::BlockReason;
use orbtrader::domain::session::SessionHours;
use orbtrader::domain::trade::ExitReason;

mod end_to_end {
    use super::*;

    #[test]
    fn breakout_then_stop() {
        let cfg = config(&["NVDA"], day(3), day(3));
        let data = MockDataPort::new().with_bars("NVDA", stop_out_day(day(3)));
        let vol = FixedVolatility(15.0);

        let result = Engine::new(&cfg, &data, &vol).run_configured();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.symbol, "NVDA");
        assert_eq!(trade.entry_time, at(day(3), 9, 46));
        assert_eq!(trade.exit_time, at(day(3), 9, 47));
        assert_eq!(trade.exit_reason, ExitReason::Stop);
        assert_relative_eq!(trade.entry_price, 102.5);
        assert_relative_eq!(trade.stop_price, 101.475, epsilon = 1e-9);
        assert_relative_eq!(trade.target_price, 105.575, epsilon = 1e-9);
        assert_relative_eq!(trade.exit_price, 101.475, epsilon = 1e-9);
        // 2% of 100k over a 1.025 stop is 1951 shares, capped at 10% of equity
        assert_eq!(trade.shares, 97);
        assert!(trade.shares as f64 * trade.entry_price <= 10_000.0);
        assert_eq!(trade.hold_minutes, 1);
    }

    #[test]
    fn target_exit() {
        let cfg = config(&["AMD"], day(3), day(3));
        let data = MockDataPort::new().with_bars("AMD", target_day(day(3)));
        let vol = FixedVolatility(15.0);

        let result = Engine::new(&cfg, &data, &vol).run_configured();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, ExitReason::Target);
        assert_relative_eq!(result.trades[0].exit_price, 105.575, epsilon = 1e-9);
        assert!(result.trades[0].pnl > 0.0);
    }

    #[test]
    fn higher_volatility_tier_shrinks_risk() {
        let mut cfg = config(&["NVDA"], day(3), day(3));
        // small enough that the 10% cap never binds
        cfg.sizing.limits.base_risk_fraction = 0.005;
        let data = MockDataPort::new().with_bars("NVDA", stop_out_day(day(3)));

        let calm = Engine::new(&cfg, &data, &FixedVolatility(15.0)).run_configured();
        let choppy = Engine::new(&cfg, &data, &FixedVolatility(35.0)).run_configured();

        // 500 / 1.025
        assert_eq!(calm.trades[0].shares, 487);
        // 500 * 0.7 / 1.025
        assert_eq!(choppy.trades[0].shares, 341);
    }
}

mod position_limits {
    use super::*;

    #[test]
    fn fourth_entry_waits_for_a_close() {
        let d = day(3);
        let cfg = config(&["A", "B", "C", "D"], d, d);
        let data = MockDataPort::new()
            .with_bars(
                "A",
                breakout_day(
                    d,
                    46,
                    &[
                        (103.0, 102.2, 102.8),
                        (105.8, 103.3, 105.6),
                        (105.7, 105.0, 105.5),
                    ],
                ),
            )
            .with_bars("B", drifting_day(d, 46, 5))
            .with_bars("C", drifting_day(d, 46, 5))
            .with_bars("D", drifting_day(d, 46, 5));
        let vol = FixedVolatility(15.0);

        let result = Engine::new(&cfg, &data, &vol).run_configured();
        let day_result = &result.days[0];

        assert_eq!(result.trades.len(), 4);
        // D was turned away at 09:46 and 09:47 while three positions were open
        assert_eq!(day_result.rejected_candidates, 2);
        assert_eq!(day_result.halted, None);

        let a = result.trades.iter().find(|t| t.symbol == "A").unwrap();
        assert_eq!(a.exit_reason, ExitReason::Target);
        assert_eq!(a.exit_time, at(d, 9, 48));

        // A's exit at 09:48 frees the slot for D in the same minute
        let d_trade = result.trades.iter().find(|t| t.symbol == "D").unwrap();
        assert_eq!(d_trade.entry_time, at(d, 9, 48));
        assert_relative_eq!(d_trade.entry_price, 102.8);
        assert_eq!(d_trade.exit_reason, ExitReason::Time);

        assert_eq!(result.account.open_positions, 0);
    }

    #[test]
    fn daily_trade_limit_halts_the_day() {
        let d = day(3);
        let mut cfg = config(&["A", "B", "C"], d, d);
        cfg.risk.max_daily_trades = 2;
        let data = MockDataPort::new()
            .with_bars("A", stop_out_day(d))
            .with_bars("B", stop_out_day(d))
            .with_bars("C", drifting_day(d, 50, 3));
        let vol = FixedVolatility(15.0);

        let result = Engine::new(&cfg, &data, &vol).run_configured();

        assert_eq!(result.trades.len(), 2);
        assert_eq!(
            result.days[0].halted,
            Some(BlockReason::MaxDailyTrades { trades: 2 })
        );
    }
}

mod isolation {
    use super::*;

    #[test]
    fn failing_symbol_does_not_abort_the_day() {
        let d = day(3);
        let cfg = config(&["BAD", "NVDA", "EMPTY"], d, d);
        let data = MockDataPort::new()
            .with_error("BAD", "connection reset")
            .with_bars("NVDA", stop_out_day(d));
        let vol = FixedVolatility(15.0);

        let result = Engine::new(&cfg, &data, &vol).run_configured();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].symbol, "NVDA");
        let skipped: Vec<&str> = result.days[0]
            .skipped
            .iter()
            .map(|s| s.symbol.as_str())
            .collect();
        assert_eq!(skipped, vec!["BAD", "EMPTY"]);
        assert!(result.days[0]
            .skipped
            .iter()
            .all(|s| matches!(s.reason, SkipReason::DataUnavailable(_))));
    }

    #[test]
    fn bars_outside_the_session_are_ignored() {
        let d = day(3);
        let mut bars = vec![make_bar(at(d, 8, 0), 150.0, 90.0, 120.0)];
        bars.extend(stop_out_day(d));
        let cfg = config(&["NVDA"], d, d);
        let data = MockDataPort::new().with_bars("NVDA", bars);
        let vol = FixedVolatility(15.0);

        let result = Engine::new(&cfg, &data, &vol).run_configured();

        // the pre-market spike neither sets the range nor counts as a bar
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, ExitReason::Stop);
    }

    #[test]
    fn malformed_series_is_skipped() {
        let d = day(3);
        let mut bars = stop_out_day(d);
        bars[16].high = bars[16].low - 1.0;
        let cfg = config(&["NVDA"], d, d);
        let data = MockDataPort::new().with_bars("NVDA", bars);
        let vol = FixedVolatility(15.0);

        let result = Engine::new(&cfg, &data, &vol).run_configured();

        assert!(result.trades.is_empty());
        assert!(matches!(
            result.days[0].skipped[0].reason,
            SkipReason::InvalidSeries(_)
        ));
    }
}

mod daily_limits {
    use super::*;

    #[test]
    fn daily_loss_hard_stop_halts_then_resets() {
        let mut cfg = config(&["A", "B", "C"], day(3), day(4));
        cfg.risk.daily_loss_warn = 0.001;
        cfg.risk.daily_loss_hard_stop = 0.0015;
        let data = MockDataPort::new()
            .with_bars("A", stop_out_day(day(3)))
            .with_bars("B", stop_out_day(day(3)))
            .with_bars("C", drifting_day(day(3), 50, 3))
            .with_bars("C", target_day(day(4)));
        let vol = FixedVolatility(15.0);

        let result = Engine::new(&cfg, &data, &vol).run_configured();

        assert_eq!(result.days.len(), 2);
        let first = &result.days[0];
        assert_eq!(first.trades.len(), 2);
        assert!(matches!(
            first.halted,
            Some(BlockReason::DailyLossLimit { .. })
        ));

        // a new day starts with a clean daily P&L
        let second = &result.days[1];
        assert_eq!(second.halted, None);
        assert_eq!(second.trades.len(), 1);
        assert_eq!(second.trades[0].symbol, "C");
        assert_eq!(second.trades[0].exit_reason, ExitReason::Target);
    }

    #[test]
    fn loss_streak_cools_off_overnight() {
        let mut cfg = config(&["A", "B", "C"], day(3), day(4));
        cfg.risk.max_consecutive_losses = 2;
        let data = MockDataPort::new()
            .with_bars("A", stop_out_day(day(3)))
            .with_bars("B", stop_out_day(day(3)))
            .with_bars("C", drifting_day(day(3), 50, 3))
            .with_bars("C", target_day(day(4)));
        let vol = FixedVolatility(15.0);
        let engine = Engine::new(&cfg, &data, &vol);

        let mut account = AccountState::new(100_000.0);
        let first = engine.run_day(day(3), &mut account);
        assert_eq!(first.trades.len(), 2);
        assert_eq!(
            first.halted,
            Some(BlockReason::ConsecutiveLosses { count: 2 })
        );
        assert_eq!(account.consecutive_losses, 0);

        let second = engine.run_day(day(4), &mut account);
        assert_eq!(second.trades.len(), 1);
        assert_eq!(second.trades[0].shares, 97);
    }
}

mod reporting {
    use super::*;

    #[test]
    fn snapshot_from_run() {
        let cfg = config(&["A", "B"], day(3), day(7));
        let data = MockDataPort::new()
            .with_bars("A", stop_out_day(day(3)))
            .with_bars("B", target_day(day(3)))
            .with_bars("A", target_day(day(4)));
        let vol = FixedVolatility(15.0);

        let result = Engine::new(&cfg, &data, &vol).run_configured();
        assert_eq!(result.equity_curve.len(), 5);
        assert_eq!(result.trades.len(), 3);
        // three days had no data for either symbol
        assert_eq!(result.skipped_symbol_days(), 1 + 2 * 3);

        let snap = result.snapshot(Period::Day);
        assert_eq!(snap.trades.total_trades, 3);
        assert_eq!(snap.trades.wins, 2);
        assert_eq!(snap.trades.losses, 1);
        assert_relative_eq!(snap.trades.win_rate, 200.0 / 3.0, epsilon = 1e-9);
        assert_eq!(snap.trades.exits.stop, 1);
        assert_eq!(snap.trades.exits.target, 2);
        assert_eq!(snap.periods.returns.len(), 2);
        assert_relative_eq!(
            snap.ending_equity,
            result.account.equity,
            epsilon = 1e-6
        );
        assert!(snap.trades.profit_factor.unwrap() > 1.0);
    }
}

mod synthetic {
    use super::*;

    fn run_month(seed: u64) -> orbtrader::domain::backtest::BacktestResult {
        let cfg = config(&["NVDA", "AMD", "TSLA", "META"], day(3), day(31));
        let adapter = SyntheticAdapter::new(seed, SessionHours::default());
        Engine::new(&cfg, &adapter, &adapter).run_configured()
    }

    #[test]
    fn same_seed_same_ledger() {
        let a = run_month(11);
        let b = run_month(11);
        assert_eq!(a.trades, b.trades);
        assert_eq!(a.days.len(), 21);
    }

    #[test]
    fn ledger_respects_limits() {
        let result = run_month(5);
        for day in &result.days {
            assert!(day.trades.len() <= 6);
        }
        for trade in &result.trades {
            assert!(trade.shares > 0);
            assert!(trade.hold_minutes >= 0);
            assert!(trade.exit_time >= trade.entry_time);
            match trade.exit_reason {
                ExitReason::Stop => assert_relative_eq!(trade.exit_price, trade.stop_price),
                ExitReason::Target => assert_relative_eq!(trade.exit_price, trade.target_price),
                ExitReason::Time => {}
            }
        }
        assert_eq!(result.account.open_positions, 0);
    }
}
