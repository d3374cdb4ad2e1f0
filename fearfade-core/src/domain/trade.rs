//! Trade lifecycle — `OpenTrade` closes into `ClosedTrade`, one way.
//!
//! Closing consumes the open trade, so a double close or a read of
//! derived fields before close does not type-check. While open, the trade
//! folds each bar's range into running extremes; the drawdown window is
//! therefore `[open_date, close_date]` inclusive without ever holding a
//! reference to the bar series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::bar::MarketBar;

/// Round to cents. Open/close prices are ledger identity and recorded at
/// 2 decimals; derived figures keep full precision until presentation.
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Long,
    Short,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Long => "Long",
            TradeSide::Short => "Short",
        }
    }
}

/// A position that has been opened and not yet closed.
///
/// `take_profit`/`stop_loss` are `None` only for the synthetic
/// buy-and-hold trade. `capital_at_risk` is the account balance at open
/// time — the denominator for the percentage figures computed at close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTrade {
    pub open_date: NaiveDate,
    pub open_price: f64,
    pub side: TradeSide,
    pub shares: u64,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    pub capital_at_risk: f64,
    min_low: f64,
    max_high: f64,
}

impl OpenTrade {
    /// Open at the bar's opening price. The opening bar's range counts
    /// toward the excursion window.
    pub fn open(
        bar: &MarketBar,
        side: TradeSide,
        shares: u64,
        take_profit: Option<f64>,
        stop_loss: Option<f64>,
        capital_at_risk: f64,
    ) -> Self {
        Self {
            open_date: bar.date,
            open_price: round2(bar.open),
            side,
            shares,
            take_profit,
            stop_loss,
            capital_at_risk,
            min_low: bar.low,
            max_high: bar.high,
        }
    }

    /// Fold a bar's range into the running extremes. Called once per bar
    /// while the trade is open, exit bar included.
    pub fn observe(&mut self, bar: &MarketBar) {
        self.min_low = self.min_low.min(bar.low);
        self.max_high = self.max_high.max(bar.high);
    }

    /// Close the trade, consuming it.
    ///
    /// `realized_return` is `(close − open) × shares` for Long and
    /// `(open − close) × shares` for Short. `max_drawdown` is the worst
    /// intrabar excursion over the trade's window; for a losing trade it
    /// is clamped so the drawdown is never smaller in magnitude than the
    /// realized loss.
    pub fn close(self, date: NaiveDate, price: f64) -> ClosedTrade {
        let close_price = round2(price);
        let shares = self.shares as f64;
        let (realized_return, excursion) = match self.side {
            TradeSide::Long => (
                (close_price - self.open_price) * shares,
                (self.min_low - self.open_price) * shares,
            ),
            TradeSide::Short => (
                (self.open_price - close_price) * shares,
                (self.open_price - self.max_high) * shares,
            ),
        };
        let max_drawdown = if realized_return < 0.0 {
            excursion.min(realized_return)
        } else {
            excursion
        };
        let (pct_return, pct_max_drawdown) = if self.capital_at_risk == 0.0 {
            (0.0, 0.0)
        } else {
            (
                realized_return / self.capital_at_risk * 100.0,
                max_drawdown / self.capital_at_risk * 100.0,
            )
        };
        ClosedTrade {
            open_date: self.open_date,
            open_price: self.open_price,
            side: self.side,
            shares: self.shares,
            take_profit: self.take_profit,
            stop_loss: self.stop_loss,
            capital_at_risk: self.capital_at_risk,
            close_date: date,
            close_price,
            realized_return,
            pct_return,
            duration_days: (date - self.open_date).num_days(),
            max_drawdown,
            pct_max_drawdown,
        }
    }
}

/// A completed round trip. Immutable; every derived field is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub open_date: NaiveDate,
    pub open_price: f64,
    pub side: TradeSide,
    pub shares: u64,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    pub capital_at_risk: f64,
    pub close_date: NaiveDate,
    pub close_price: f64,
    pub realized_return: f64,
    pub pct_return: f64,
    pub duration_days: i64,
    pub max_drawdown: f64,
    pub pct_max_drawdown: f64,
}

impl ClosedTrade {
    /// Strictly positive return. Break-even trades are neither winners
    /// nor losers.
    pub fn is_winner(&self) -> bool {
        self.realized_return > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.realized_return < 0.0
    }
}
