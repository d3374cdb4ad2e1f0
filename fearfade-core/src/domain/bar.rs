//! MarketBar — one day of prices plus the sentiment reading.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLC bar with the day's sentiment index score, keyed by calendar date.
///
/// The sentiment score is conventionally 0–100 (fear → greed) but the
/// engine only ever compares it against the configured thresholds, so any
/// finite range works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub sentiment: f64,
}

impl MarketBar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, sentiment: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            sentiment,
        }
    }

    /// Basic sanity check: finite positive prices with
    /// `low <= open,close <= high`.
    pub fn is_sane(&self) -> bool {
        let finite = self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.sentiment.is_finite();
        finite
            && self.low > 0.0
            && self.high >= self.low
            && self.low <= self.open
            && self.open <= self.high
            && self.low <= self.close
            && self.close <= self.high
    }
}

/// Input contract violations, fatal before any simulation starts.
#[derive(Debug, Error, PartialEq)]
pub enum BarError {
    #[error("bar series is empty")]
    EmptySeries,

    #[error("bar dates must be strictly increasing: {prev} is not before {next}")]
    NonMonotonic { prev: NaiveDate, next: NaiveDate },

    #[error("insane bar on {date}: {reason}")]
    InvalidBar { date: NaiveDate, reason: String },
}

/// Validate a whole series: non-empty, strictly increasing dates, every
/// bar sane. The engine refuses to run on anything that fails here.
pub fn validate_series(bars: &[MarketBar]) -> Result<(), BarError> {
    if bars.is_empty() {
        return Err(BarError::EmptySeries);
    }
    for bar in bars {
        if !bar.is_sane() {
            return Err(BarError::InvalidBar {
                date: bar.date,
                reason: format!(
                    "open={} high={} low={} close={} sentiment={}",
                    bar.open, bar.high, bar.low, bar.close, bar.sentiment
                ),
            });
        }
    }
    for pair in bars.windows(2) {
        if pair[0].date >= pair[1].date {
            return Err(BarError::NonMonotonic {
                prev: pair[0].date,
                next: pair[1].date,
            });
        }
    }
    Ok(())
}
