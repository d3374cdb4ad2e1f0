//! FearFade Runner — backtest orchestration around `fearfade-core`.
//!
//! This crate builds on the core engine to provide:
//! - Bar loading from CSV, plus deterministic synthetic series
//! - Single-run orchestration with a content-addressed run id
//! - The performance report and its plain-text rendering
//! - Artifact export (transaction log, equity curve, report, manifest)
//! - Parallel threshold sweeps

pub mod artifacts;
pub mod config;
pub mod data_loader;
pub mod report;
pub mod runner;
pub mod sweep;

pub use artifacts::{transaction_records, EquityPoint, RunManifest, TransactionRecord};
pub use config::{ConfigFileError, DataConfig, RunConfig, RunId};
pub use data_loader::{
    dataset_hash, generate_synthetic_bars, load_bars_csv, write_bars_csv, LoadError,
};
pub use report::{MetricError, PerformanceReport};
pub use runner::{execute, resolve_bars, RunError, RunOutput};
pub use sweep::{run_sweep, write_sweep_csv, SweepResults, SweepRow, ThresholdGrid};
