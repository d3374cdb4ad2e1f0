//! Signal and sentiment-rating enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-bar strategy decision. Produced once by the signal generator,
/// consumed once by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "Buy",
            Signal::Sell => "Sell",
            Signal::Hold => "Hold",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named band for a fear/greed score, for display only — the strategy
/// compares raw scores against its thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentRating {
    ExtremeFear,
    Fear,
    Neutral,
    Greed,
    ExtremeGreed,
}

impl SentimentRating {
    /// Band boundaries: <25 extreme fear, <50 fear, <55 neutral,
    /// <75 greed, else extreme greed.
    pub fn from_score(score: f64) -> Self {
        if score < 25.0 {
            SentimentRating::ExtremeFear
        } else if score < 50.0 {
            SentimentRating::Fear
        } else if score < 55.0 {
            SentimentRating::Neutral
        } else if score < 75.0 {
            SentimentRating::Greed
        } else {
            SentimentRating::ExtremeGreed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentRating::ExtremeFear => "Extreme Fear",
            SentimentRating::Fear => "Fear",
            SentimentRating::Neutral => "Neutral",
            SentimentRating::Greed => "Greed",
            SentimentRating::ExtremeGreed => "Extreme Greed",
        }
    }
}

impl fmt::Display for SentimentRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
