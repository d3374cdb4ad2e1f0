//! Performance report — pure functions over a finished run.
//!
//! Every metric is computed from scratch from the closed-trade list, the
//! balances, and the bar series; nothing is updated incrementally. A
//! metric whose denominator degenerates (no trades, zero year span, a
//! worthless baseline) is carried as `None` and rendered as `n/a` — it
//! never turns into NaN and never aborts a run that already finished.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use thiserror::Error;

use fearfade_core::domain::{ClosedTrade, MarketBar, TradeSide};
use fearfade_core::engine::{buy_and_hold, BacktestOutcome, EngineError};

/// Why a single report figure cannot be computed. Local to the report;
/// the trade list and balance stay valid regardless.
#[derive(Debug, Error, PartialEq)]
pub enum MetricError {
    #[error("no closed trades to average over")]
    NoTrades,

    #[error("{start} and {end} fall in the same calendar year; annualised figures need a year boundary")]
    ZeroYearSpan { start: NaiveDate, end: NaiveDate },

    #[error("buy-and-hold final value {0} is not positive; relative performance is undefined")]
    DegenerateBaseline(f64),
}

// ─── Individual metric functions ────────────────────────────────────

/// Percentage return divided by the calendar-year span of the series.
/// The span is the difference of the year components, so a backtest
/// inside one calendar year has no annualised figure.
pub fn annualised_pct(
    total_pct: f64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<f64, MetricError> {
    let span = end.year() - start.year();
    if span == 0 {
        return Err(MetricError::ZeroYearSpan { start, end });
    }
    Ok(total_pct / f64::from(span))
}

/// A total divided over the trade count.
pub fn per_trade_average(total: f64, trade_count: usize) -> Result<f64, MetricError> {
    if trade_count == 0 {
        return Err(MetricError::NoTrades);
    }
    Ok(total / trade_count as f64)
}

/// Winners over total, as a percentage.
pub fn win_rate_pct(winners: usize, trade_count: usize) -> Result<f64, MetricError> {
    if trade_count == 0 {
        return Err(MetricError::NoTrades);
    }
    Ok(winners as f64 / trade_count as f64 * 100.0)
}

/// Strategy final balance relative to the buy-and-hold final value.
pub fn performance_vs_baseline_pct(
    final_balance: f64,
    baseline_final: f64,
) -> Result<f64, MetricError> {
    if baseline_final <= 0.0 {
        return Err(MetricError::DegenerateBaseline(baseline_final));
    }
    Ok((final_balance - baseline_final) / baseline_final * 100.0)
}

/// Longest and mean length of maximal runs of strictly losing trades,
/// in list order. A run ends at any non-negative trade. `(0, 0.0)` when
/// no trade lost.
pub fn loss_streaks(trades: &[ClosedTrade]) -> (usize, f64) {
    let mut streaks: Vec<usize> = Vec::new();
    let mut current = 0;
    for trade in trades {
        if trade.is_loser() {
            current += 1;
        } else {
            if current > 0 {
                streaks.push(current);
            }
            current = 0;
        }
    }
    if current > 0 {
        streaks.push(current);
    }

    match streaks.iter().max() {
        None => (0, 0.0),
        Some(&max) => (max, streaks.iter().sum::<usize>() as f64 / streaks.len() as f64),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (mut sum, mut n) = (0.0, 0usize);
    for v in values {
        sum += v;
        n += 1;
    }
    (n > 0).then(|| sum / n as f64)
}

// ─── The report ─────────────────────────────────────────────────────

/// Descriptive statistics for one finished backtest. `None` marks a
/// degenerate metric (see `MetricError` for the taxonomy). Values keep
/// full precision; `render` rounds to 2 decimals for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_days: i64,
    pub total_trades: usize,
    pub total_buys: usize,
    pub total_sells: usize,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    pub annualised_return_pct: Option<f64>,
    pub average_return: Option<f64>,
    pub average_return_pct: Option<f64>,
    pub average_trade_duration_days: Option<i64>,
    pub winners: usize,
    pub long_winners: usize,
    pub short_winners: usize,
    pub average_winner_return: f64,
    pub average_winner_return_pct: f64,
    pub losers: usize,
    pub long_losers: usize,
    pub short_losers: usize,
    pub average_loser_return: f64,
    pub average_loser_return_pct: f64,
    pub win_rate_pct: Option<f64>,
    pub average_drawdown: Option<f64>,
    pub average_drawdown_pct: Option<f64>,
    pub max_loss_streak: usize,
    pub average_loss_streak: f64,
    pub buy_and_hold_return: f64,
    pub buy_and_hold_return_pct: f64,
    pub annualised_buy_and_hold_pct: Option<f64>,
    pub performance_vs_buy_and_hold_pct: Option<f64>,
}

impl PerformanceReport {
    /// Aggregate a finished run. The baseline is recomputed here from
    /// the bars and the run's initial balance, so the only failure mode
    /// is a bar series the baseline cannot trade.
    pub fn new(outcome: &BacktestOutcome, bars: &[MarketBar]) -> Result<Self, EngineError> {
        let trades = &outcome.trades;
        let initial = outcome.initial_balance;
        let total_return = outcome.final_balance - initial;
        let total_return_pct = total_return / initial * 100.0;

        // Validates the series, so the indexing below cannot see an
        // empty slice.
        let baseline = buy_and_hold(bars, initial)?;
        let start_date = bars[0].date;
        let end_date = bars[bars.len() - 1].date;

        let bh_return = baseline.realized_return;
        let bh_pct = bh_return / initial * 100.0;
        let bh_final = initial + bh_return;

        let winners: Vec<&ClosedTrade> = trades.iter().filter(|t| t.is_winner()).collect();
        let losers: Vec<&ClosedTrade> = trades.iter().filter(|t| t.is_loser()).collect();
        let count_side =
            |set: &[&ClosedTrade], side: TradeSide| set.iter().filter(|t| t.side == side).count();

        let (max_loss_streak, average_loss_streak) = loss_streaks(trades);

        Ok(Self {
            start_date,
            end_date,
            duration_days: (end_date - start_date).num_days(),
            total_trades: trades.len(),
            total_buys: trades.iter().filter(|t| t.side == TradeSide::Long).count(),
            total_sells: trades.iter().filter(|t| t.side == TradeSide::Short).count(),
            initial_balance: initial,
            final_balance: outcome.final_balance,
            total_return,
            total_return_pct,
            annualised_return_pct: annualised_pct(total_return_pct, start_date, end_date).ok(),
            average_return: per_trade_average(total_return, trades.len()).ok(),
            average_return_pct: per_trade_average(total_return_pct, trades.len()).ok(),
            average_trade_duration_days: mean(
                trades.iter().map(|t| t.duration_days as f64),
            )
            .map(|d| d as i64),
            winners: winners.len(),
            long_winners: count_side(&winners, TradeSide::Long),
            short_winners: count_side(&winners, TradeSide::Short),
            average_winner_return: mean(winners.iter().map(|t| t.realized_return))
                .unwrap_or(0.0),
            average_winner_return_pct: mean(winners.iter().map(|t| t.pct_return)).unwrap_or(0.0),
            losers: losers.len(),
            long_losers: count_side(&losers, TradeSide::Long),
            short_losers: count_side(&losers, TradeSide::Short),
            average_loser_return: mean(losers.iter().map(|t| t.realized_return)).unwrap_or(0.0),
            average_loser_return_pct: mean(losers.iter().map(|t| t.pct_return)).unwrap_or(0.0),
            win_rate_pct: win_rate_pct(winners.len(), trades.len()).ok(),
            average_drawdown: mean(trades.iter().map(|t| t.max_drawdown)),
            average_drawdown_pct: mean(trades.iter().map(|t| t.pct_max_drawdown)),
            max_loss_streak,
            average_loss_streak,
            buy_and_hold_return: bh_return,
            buy_and_hold_return_pct: bh_pct,
            annualised_buy_and_hold_pct: annualised_pct(bh_pct, start_date, end_date).ok(),
            performance_vs_buy_and_hold_pct: performance_vs_baseline_pct(
                outcome.final_balance,
                bh_final,
            )
            .ok(),
        })
    }

    /// The human-readable report, one `Label: value` line per metric.
    pub fn render(&self) -> String {
        fn num(v: f64) -> String {
            format!("{v:.2}")
        }
        fn opt(v: Option<f64>) -> String {
            v.map(num).unwrap_or_else(|| "n/a".to_string())
        }
        fn pct(v: f64) -> String {
            format!("{v:.2}%")
        }
        fn opt_pct(v: Option<f64>) -> String {
            v.map(pct).unwrap_or_else(|| "n/a".to_string())
        }
        let duration = match self.average_trade_duration_days {
            Some(d) => format!("{d} days"),
            None => "n/a".to_string(),
        };
        let win_rate = opt_pct(self.win_rate_pct);

        format!(
            "Backtest Report \n\
             ----------------------------------------------- \n\
             Start Date: {start} \n\
             End Date: {end} \n\
             Backtest Duration: {dur} days \n\
             Total Trades: {trades} \n\
             Total Buys: {buys} \n\
             Total Sells: {sells} \n\
             Initial Balance: {initial} \n\
             Final Balance: {fin} \n\
             Total Returns: {ret} \n\
             Total Returns (%): {ret_pct} \n\
             Annualised Returns (%): {ann_pct} \n\
             Average Returns: {avg_ret} \n\
             Average Returns (%): {avg_ret_pct} \n\
             Average Trade Duration: {avg_dur} \n\
             Number of Winners: {winners} \n\
             Number of Long Winners: {long_w} \n\
             Number of Short Winners: {short_w} \n\
             Average Winner Returns: {avg_w} \n\
             Average Winner Returns (%): {avg_w_pct} \n\
             Number of Losers: {losers} \n\
             Number of Long Losers: {long_l} \n\
             Number of Short Losers: {short_l} \n\
             Average Loser Returns: {avg_l} \n\
             Average Loser Returns (%): {avg_l_pct} \n\
             Win Rate (%): {win_rate} \n\
             Average Drawdown: {avg_dd} \n\
             Average Drawdown (%): {avg_dd_pct} \n\
             Max Loss Streak: {max_streak} \n\
             Average Loss Streak: {avg_streak} \n\
             Buy and Hold Returns: {bh} \n\
             Buy and Hold Returns (%): {bh_pct} \n\
             Annualised Buy and Hold Returns (%): {bh_ann} \n\
             Performance vs Buy and Hold (%): {vs_bh} \n",
            start = self.start_date,
            end = self.end_date,
            dur = self.duration_days,
            trades = self.total_trades,
            buys = self.total_buys,
            sells = self.total_sells,
            initial = num(self.initial_balance),
            fin = num(self.final_balance),
            ret = num(self.total_return),
            ret_pct = pct(self.total_return_pct),
            ann_pct = opt_pct(self.annualised_return_pct),
            avg_ret = opt(self.average_return),
            avg_ret_pct = opt_pct(self.average_return_pct),
            avg_dur = duration,
            winners = self.winners,
            long_w = self.long_winners,
            short_w = self.short_winners,
            avg_w = num(self.average_winner_return),
            avg_w_pct = pct(self.average_winner_return_pct),
            losers = self.losers,
            long_l = self.long_losers,
            short_l = self.short_losers,
            avg_l = num(self.average_loser_return),
            avg_l_pct = pct(self.average_loser_return_pct),
            win_rate = win_rate,
            avg_dd = opt(self.average_drawdown),
            avg_dd_pct = opt_pct(self.average_drawdown_pct),
            max_streak = self.max_loss_streak,
            avg_streak = num(self.average_loss_streak),
            bh = num(self.buy_and_hold_return),
            bh_pct = pct(self.buy_and_hold_return_pct),
            bh_ann = opt_pct(self.annualised_buy_and_hold_pct),
            vs_bh = opt_pct(self.performance_vs_buy_and_hold_pct),
        )
    }
}
