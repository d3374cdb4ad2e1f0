//! FearFade Core — contrarian sentiment backtesting engine.
//!
//! This crate contains the simulation heart of the system:
//! - Domain types (market bars, signals, the trade lifecycle)
//! - Contrarian signal generation gated by shadow brackets
//! - Bar-by-bar backtest loop with bracketed position management
//! - Configurable intrabar tie-break policy
//! - Buy-and-hold baseline
//!
//! No I/O lives here; loading data, reporting, and artifacts belong to
//! the runner crate.

pub mod config;
pub mod domain;
pub mod engine;
pub mod execution;
pub mod signals;
