//! Domain types: bars, signals, trades.

pub mod bar;
pub mod signal;
pub mod trade;

pub use bar::{validate_series, BarError, MarketBar};
pub use signal::{SentimentRating, Signal};
pub use trade::{ClosedTrade, OpenTrade, TradeSide};
