//! Bar-by-bar backtest loop.
//!
//! Three phases per bar:
//! 1. Resolve exits: fold the bar into each open trade's extremes, then
//!    test its bracket; a touch closes at the touched level, not the close
//! 2. Open: size and open a bracketed trade if the bar's signal fires
//! 3. Same-bar exit check: a just-opened bracket the bar already touches
//!    closes before the next bar
//!
//! The last bar replaces phases 1 and 3 with forced finalization: extremes
//! are still folded and a final-bar signal still opens (sized on the
//! balance as it stands), but every open trade then closes at that bar's
//! close with no bracket check. The balance moves only when a trade
//! closes, by exactly its realized return.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, StrategyConfig};
use crate::domain::{
    validate_series, BarError, ClosedTrade, MarketBar, OpenTrade, Signal, TradeSide,
};
use crate::execution::{BracketHit, ExitTieBreak};
use crate::signals::generate_signals;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Bar(#[from] BarError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Sizing needs a strictly positive open-to-stop distance; anything
    /// else would imply an unbounded share count.
    #[error("degenerate stop distance on {date}: open {open} vs stop {stop}")]
    DegenerateStopDistance {
        date: NaiveDate,
        open: f64,
        stop: f64,
    },
}

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestOutcome {
    pub trades: Vec<ClosedTrade>,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub signals: Vec<Signal>,
}

/// One backtest over one bar series. Construction validates the inputs
/// and precomputes the signal sequence; `run` consumes the engine, so a
/// run cannot be resumed or replayed — rebuild from the same inputs to
/// reproduce it.
pub struct BacktestEngine<'a> {
    bars: &'a [MarketBar],
    config: StrategyConfig,
    tie_break: ExitTieBreak,
    signals: Vec<Signal>,
}

impl<'a> BacktestEngine<'a> {
    pub fn new(
        bars: &'a [MarketBar],
        config: StrategyConfig,
        tie_break: ExitTieBreak,
    ) -> Result<Self, EngineError> {
        validate_series(bars)?;
        config.validate()?;
        let signals = generate_signals(bars, &config);
        Ok(Self {
            bars,
            config,
            tie_break,
            signals,
        })
    }

    /// The precomputed per-bar signal sequence, parallel to the bars.
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Run the loop to completion.
    pub fn run(self) -> Result<BacktestOutcome, EngineError> {
        let initial_balance = self.config.initial_balance;
        let mut balance = initial_balance;
        let mut open_trades: Vec<OpenTrade> = Vec::new();
        let mut trades: Vec<ClosedTrade> = Vec::new();
        let last = self.bars.len() - 1;

        for (i, bar) in self.bars.iter().enumerate() {
            let final_bar = i == last;

            for trade in &mut open_trades {
                trade.observe(bar);
            }
            if !final_bar {
                close_touched(&mut open_trades, self.tie_break, bar, &mut balance, &mut trades);
            }

            let side = match self.signals[i] {
                Signal::Buy => Some(TradeSide::Long),
                Signal::Sell => Some(TradeSide::Short),
                Signal::Hold => None,
            };
            if let Some(side) = side {
                let trade = self.open_position(bar, side, balance)?;
                open_trades.push(trade);
                if !final_bar {
                    close_touched(&mut open_trades, self.tie_break, bar, &mut balance, &mut trades);
                }
            }

            if final_bar {
                for trade in open_trades.drain(..) {
                    let done = trade.close(bar.date, bar.close);
                    balance += done.realized_return;
                    trades.push(done);
                }
            }
        }

        Ok(BacktestOutcome {
            trades,
            initial_balance,
            final_balance: balance,
            signals: self.signals,
        })
    }

    fn open_position(
        &self,
        bar: &MarketBar,
        side: TradeSide,
        balance: f64,
    ) -> Result<OpenTrade, EngineError> {
        let buffer = self.config.loss_buffer_pct;
        let reward = buffer * self.config.risk_reward_ratio;
        let (stop_loss, take_profit) = match side {
            TradeSide::Long => (bar.open * (1.0 - buffer), bar.open * (1.0 + reward)),
            TradeSide::Short => (bar.open * (1.0 + buffer), bar.open * (1.0 - reward)),
        };
        let shares = size_position(self.config.risk_per_trade_pct * balance, bar.open, stop_loss)
            .ok_or(EngineError::DegenerateStopDistance {
                date: bar.date,
                open: bar.open,
                stop: stop_loss,
            })?;
        Ok(OpenTrade::open(
            bar,
            side,
            shares,
            Some(take_profit),
            Some(stop_loss),
            balance,
        ))
    }
}

/// Close every open trade whose bracket this bar touches, crediting each
/// realized return to the balance. Closes happen at the touched level;
/// which level wins a both-touched bar is the tie-break policy's call.
fn close_touched(
    open_trades: &mut Vec<OpenTrade>,
    tie_break: ExitTieBreak,
    bar: &MarketBar,
    balance: &mut f64,
    trades: &mut Vec<ClosedTrade>,
) {
    let mut still_open = Vec::with_capacity(open_trades.len());
    for trade in open_trades.drain(..) {
        match bracket_exit(&trade, tie_break, bar) {
            Some(hit) => {
                let done = trade.close(bar.date, hit.price);
                *balance += done.realized_return;
                trades.push(done);
            }
            None => still_open.push(trade),
        }
    }
    *open_trades = still_open;
}

fn bracket_exit(trade: &OpenTrade, tie_break: ExitTieBreak, bar: &MarketBar) -> Option<BracketHit> {
    match (trade.take_profit, trade.stop_loss) {
        (Some(tp), Some(sl)) => tie_break.resolve(trade.side, tp, sl, bar),
        _ => None,
    }
}

/// Whole-share count that puts `risk_capital` on the line against the
/// open-to-stop distance. `None` when the distance is not strictly
/// positive. A negative budget (balance driven below zero) sizes to zero
/// rather than erroring; the trade still opens and realizes nothing.
fn size_position(risk_capital: f64, open: f64, stop: f64) -> Option<u64> {
    let distance = (open - stop).abs();
    if distance <= 0.0 || !distance.is_finite() {
        return None;
    }
    Some((risk_capital / distance).floor().max(0.0) as u64)
}

/// The passive baseline: `floor(initial_balance ÷ first open)` shares
/// long from the first bar's open to the last bar's close, no brackets.
/// Pure function of the bars and the starting balance; an engine run
/// cannot influence it.
pub fn buy_and_hold(bars: &[MarketBar], initial_balance: f64) -> Result<ClosedTrade, EngineError> {
    validate_series(bars)?;
    let first = &bars[0];
    let last = &bars[bars.len() - 1];
    let shares = (initial_balance / first.open).floor().max(0.0) as u64;
    let mut trade = OpenTrade::open(first, TradeSide::Long, shares, None, None, initial_balance);
    for bar in &bars[1..] {
        trade.observe(bar);
    }
    Ok(trade.close(last.date, last.close))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(day: u32, open: f64, high: f64, low: f64, close: f64, sentiment: f64) -> MarketBar {
        MarketBar::new(
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open,
            high,
            low,
            close,
            sentiment,
        )
    }

    fn cfg() -> StrategyConfig {
        StrategyConfig::new(10_000.0, 20.0, 70.0)
    }

    fn run(bars: &[MarketBar]) -> BacktestOutcome {
        BacktestEngine::new(bars, cfg(), ExitTieBreak::default())
            .unwrap()
            .run()
            .unwrap()
    }

    #[test]
    fn size_position_floors_to_whole_shares() {
        assert_eq!(size_position(100.0, 100.0, 97.0), Some(33));
        assert_eq!(size_position(100.0, 100.0, 99.9), Some(1000));
        assert_eq!(size_position(1.0, 100.0, 97.0), Some(0));
    }

    #[test]
    fn size_position_rejects_zero_distance() {
        assert_eq!(size_position(100.0, 100.0, 100.0), None);
    }

    #[test]
    fn size_position_zero_on_negative_budget() {
        assert_eq!(size_position(-50.0, 100.0, 97.0), Some(0));
    }

    #[test]
    fn empty_series_is_rejected_at_construction() {
        let err = BacktestEngine::new(&[], cfg(), ExitTieBreak::default());
        assert!(matches!(err, Err(EngineError::Bar(BarError::EmptySeries))));
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let bars = vec![bar(2, 100.0, 101.0, 99.0, 100.0, 50.0)];
        let bad = StrategyConfig::new(-1.0, 20.0, 70.0);
        let err = BacktestEngine::new(&bars, bad, ExitTieBreak::default());
        assert!(matches!(err, Err(EngineError::Config(_))));
    }

    #[test]
    fn all_hold_series_trades_nothing() {
        let bars: Vec<MarketBar> = (2..7)
            .map(|d| bar(d, 100.0, 101.0, 99.0, 100.0, 45.0))
            .collect();
        let outcome = run(&bars);
        assert!(outcome.trades.is_empty());
        assert_eq!(outcome.final_balance, 10_000.0);
        assert_eq!(outcome.signals, vec![Signal::Hold; 5]);
    }

    #[test]
    fn take_profit_exit_fills_at_the_level() {
        // Buy at 100: SL 97, TP 109, 33 shares. Bar 2 trades through the
        // target; the fill is 109, not bar 2's close.
        let bars = vec![
            bar(2, 100.0, 102.0, 99.0, 101.0, 10.0),
            bar(3, 101.0, 110.0, 100.0, 105.0, 50.0),
            bar(4, 105.0, 106.0, 104.0, 105.0, 50.0),
        ];
        let outcome = run(&bars);
        assert_eq!(outcome.trades.len(), 1);
        let t = &outcome.trades[0];
        assert_eq!(t.shares, 33);
        assert!((t.close_price - 109.0).abs() < 1e-9);
        assert!((t.realized_return - 297.0).abs() < 1e-9);
        assert!((outcome.final_balance - 10_297.0).abs() < 1e-9);
    }

    #[test]
    fn stop_loss_exit_fills_at_the_level() {
        let bars = vec![
            bar(2, 100.0, 102.0, 99.0, 101.0, 10.0),
            bar(3, 99.0, 100.0, 96.0, 97.0, 50.0),
            bar(4, 97.0, 98.0, 96.0, 97.0, 50.0),
        ];
        let outcome = run(&bars);
        assert_eq!(outcome.trades.len(), 1);
        let t = &outcome.trades[0];
        assert!((t.close_price - 97.0).abs() < 1e-9);
        assert!((t.realized_return - (-99.0)).abs() < 1e-9);
        assert!(t.max_drawdown.abs() >= t.realized_return.abs());
    }

    #[test]
    fn same_bar_open_and_close() {
        // The opening bar itself reaches the 109 target.
        let bars = vec![
            bar(2, 100.0, 110.0, 99.0, 108.0, 10.0),
            bar(3, 108.0, 109.0, 107.0, 108.0, 50.0),
        ];
        let outcome = run(&bars);
        assert_eq!(outcome.trades.len(), 1);
        let t = &outcome.trades[0];
        assert_eq!(t.open_date, t.close_date);
        assert_eq!(t.duration_days, 0);
        assert!((t.close_price - 109.0).abs() < 1e-9);
    }

    #[test]
    fn concurrent_long_and_short_positions() {
        // Fear opens a Long on bar 1, greed a Short on bar 2; neither
        // bracket is touched, so both ride to forced finalization.
        let bars = vec![
            bar(2, 100.0, 101.0, 99.0, 100.0, 10.0),
            bar(3, 100.0, 101.0, 99.0, 100.0, 80.0),
            bar(4, 100.0, 101.0, 99.0, 100.5, 50.0),
        ];
        let outcome = run(&bars);
        assert_eq!(outcome.trades.len(), 2);
        assert_eq!(outcome.trades[0].side, TradeSide::Long);
        assert_eq!(outcome.trades[1].side, TradeSide::Short);
        assert_eq!(outcome.trades[0].close_date, outcome.trades[1].close_date);
    }

    #[test]
    fn final_bar_forces_close_without_bracket_check() {
        // Bar 2 is last: its high pierces the 109 target, but forced
        // finalization fills at the close instead.
        let bars = vec![
            bar(2, 100.0, 102.0, 99.0, 101.0, 10.0),
            bar(3, 101.0, 110.0, 100.0, 104.0, 50.0),
        ];
        let outcome = run(&bars);
        assert_eq!(outcome.trades.len(), 1);
        assert!((outcome.trades[0].close_price - 104.0).abs() < 1e-9);
    }

    #[test]
    fn balance_conservation() {
        let bars = vec![
            bar(2, 100.0, 110.0, 95.0, 100.0, 10.0),
            bar(3, 100.0, 104.0, 96.0, 102.0, 80.0),
            bar(4, 102.0, 108.0, 99.0, 103.0, 15.0),
            bar(5, 103.0, 105.0, 95.0, 96.0, 60.0),
            bar(6, 96.0, 99.0, 94.0, 97.0, 75.0),
        ];
        let outcome = run(&bars);
        let total: f64 = outcome.trades.iter().map(|t| t.realized_return).sum();
        assert!((outcome.final_balance - (outcome.initial_balance + total)).abs() < 1e-9);
    }

    #[test]
    fn stop_loss_first_tie_break_changes_the_fill() {
        // One wide bar touches both levels of the bar-1 Buy.
        let bars = vec![
            bar(2, 100.0, 101.0, 99.0, 100.0, 10.0),
            bar(3, 100.0, 112.0, 95.0, 100.0, 50.0),
            bar(4, 100.0, 101.0, 99.0, 100.0, 50.0),
        ];
        let optimistic = BacktestEngine::new(&bars, cfg(), ExitTieBreak::TakeProfitFirst)
            .unwrap()
            .run()
            .unwrap();
        let conservative = BacktestEngine::new(&bars, cfg(), ExitTieBreak::StopLossFirst)
            .unwrap()
            .run()
            .unwrap();
        assert!((optimistic.trades[0].close_price - 109.0).abs() < 1e-9);
        assert!((conservative.trades[0].close_price - 97.0).abs() < 1e-9);
        // The tie-break never reshapes the signal sequence.
        assert_eq!(optimistic.signals, conservative.signals);
    }

    #[test]
    fn buy_and_hold_baseline() {
        let bars = vec![
            bar(2, 100.0, 102.0, 99.0, 101.0, 10.0),
            bar(3, 101.0, 103.0, 98.0, 102.0, 50.0),
            bar(4, 102.0, 104.0, 101.0, 103.0, 80.0),
        ];
        let baseline = buy_and_hold(&bars, 10_000.0).unwrap();
        assert_eq!(baseline.shares, 100);
        assert_eq!(baseline.side, TradeSide::Long);
        assert_eq!(baseline.take_profit, None);
        assert_eq!(baseline.stop_loss, None);
        assert!((baseline.realized_return - 300.0).abs() < 1e-9);
        // worst excursion: min low 98 over the window
        assert!((baseline.max_drawdown - (-200.0)).abs() < 1e-9);
    }

    #[test]
    fn buy_and_hold_ignores_engine_state() {
        let bars = vec![
            bar(2, 100.0, 102.0, 99.0, 101.0, 10.0),
            bar(3, 101.0, 103.0, 98.0, 102.0, 50.0),
            bar(4, 102.0, 104.0, 101.0, 103.0, 80.0),
        ];
        let before = buy_and_hold(&bars, 10_000.0).unwrap();
        let _ = run(&bars);
        let after = buy_and_hold(&bars, 10_000.0).unwrap();
        assert_eq!(before, after);
    }
}
