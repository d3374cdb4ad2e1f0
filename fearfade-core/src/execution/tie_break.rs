//! Intrabar bracket resolution and the tie-break policy.
//!
//! A daily bar only tells us the range it traded, not the path. When one
//! bar touches both the take-profit and the stop-loss, which level "won"
//! is a modeling choice, so it is an explicit policy instead of a
//! hard-coded ordering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::{MarketBar, TradeSide};

/// Which bracket level an exit resolved at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
}

/// A resolved intrabar exit: the touched level and its price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BracketHit {
    pub price: f64,
    pub reason: ExitReason,
}

/// Resolution order when a single bar touches both bracket levels.
///
/// `TakeProfitFirst` reproduces the optimistic ordering the strategy was
/// originally written with; `StopLossFirst` is the conservative reading
/// of the same bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitTieBreak {
    #[default]
    TakeProfitFirst,
    StopLossFirst,
}

impl ExitTieBreak {
    /// Test a bracket against one bar's range. Returns the exit if the
    /// bar touched a level, applying the tie-break only when both were
    /// touched.
    pub fn resolve(
        &self,
        side: TradeSide,
        take_profit: f64,
        stop_loss: f64,
        bar: &MarketBar,
    ) -> Option<BracketHit> {
        let (tp_hit, sl_hit) = touches(side, take_profit, stop_loss, bar);
        let reason = match (tp_hit, sl_hit) {
            (false, false) => return None,
            (true, false) => ExitReason::TakeProfit,
            (false, true) => ExitReason::StopLoss,
            (true, true) => match self {
                ExitTieBreak::TakeProfitFirst => ExitReason::TakeProfit,
                ExitTieBreak::StopLossFirst => ExitReason::StopLoss,
            },
        };
        let price = match reason {
            ExitReason::TakeProfit => take_profit,
            ExitReason::StopLoss => stop_loss,
        };
        Some(BracketHit { price, reason })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExitTieBreak::TakeProfitFirst => "take-profit-first",
            ExitTieBreak::StopLossFirst => "stop-loss-first",
        }
    }
}

impl fmt::Display for ExitTieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExitTieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "take-profit-first" | "take_profit_first" => Ok(ExitTieBreak::TakeProfitFirst),
            "stop-loss-first" | "stop_loss_first" => Ok(ExitTieBreak::StopLossFirst),
            other => Err(format!(
                "unknown tie-break '{other}' (expected take-profit-first or stop-loss-first)"
            )),
        }
    }
}

/// Whether the bar touches either level of a bracket. The signal
/// generator's shadow unblock check uses this OR-form directly, so the
/// tie-break policy can never change a signal sequence.
pub fn bracket_touched(side: TradeSide, take_profit: f64, stop_loss: f64, bar: &MarketBar) -> bool {
    let (tp_hit, sl_hit) = touches(side, take_profit, stop_loss, bar);
    tp_hit || sl_hit
}

fn touches(side: TradeSide, take_profit: f64, stop_loss: f64, bar: &MarketBar) -> (bool, bool) {
    match side {
        // Long: profit above, stop below.
        TradeSide::Long => (bar.high >= take_profit, bar.low <= stop_loss),
        // Short: profit below, stop above.
        TradeSide::Short => (bar.low <= take_profit, bar.high >= stop_loss),
    }
}
