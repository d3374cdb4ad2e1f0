//! Execution policy: how intrabar bracket touches resolve to exits.

pub mod tie_break;

pub use tie_break::{bracket_touched, BracketHit, ExitReason, ExitTieBreak};
