//! Run orchestration — wires together data loading, the engine, the
//! report, and artifact export.
//!
//! `execute` is the high-level entry point used by the CLI: resolve the
//! bar series, run one backtest, build the report, and (if an artifacts
//! directory is configured) write the full artifact set.

use std::path::{Path, PathBuf};

use anyhow::Context;
use thiserror::Error;

use fearfade_core::domain::MarketBar;
use fearfade_core::engine::{BacktestEngine, BacktestOutcome, EngineError};

use crate::artifacts::{
    equity_curve, transaction_records, write_equity_csv, write_manifest_json, write_report_json,
    write_trades_csv, write_trades_json, RunManifest,
};
use crate::config::{ConfigFileError, DataConfig, RunConfig, RunId};
use crate::data_loader::{dataset_hash, generate_synthetic_bars, load_bars_csv, LoadError};
use crate::report::PerformanceReport;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigFileError),

    #[error("data error: {0}")]
    Data(#[from] LoadError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Artifacts(#[from] anyhow::Error),
}

/// Everything one run produced, ready for display or export.
#[derive(Debug)]
pub struct RunOutput {
    pub run_id: RunId,
    pub bars: Vec<MarketBar>,
    pub dataset_hash: String,
    pub outcome: BacktestOutcome,
    pub report: PerformanceReport,
    /// Where artifacts were written, when the config asked for them.
    pub artifacts_dir: Option<PathBuf>,
}

/// Materialize the bar series a config points at.
pub fn resolve_bars(data: &DataConfig) -> Result<Vec<MarketBar>, LoadError> {
    match data {
        DataConfig::Csv { path } => load_bars_csv(path),
        DataConfig::Synthetic { seed, start, bars } => {
            Ok(generate_synthetic_bars(seed, *start, *bars))
        }
    }
}

/// Run a single backtest from a `RunConfig`.
pub fn execute(config: &RunConfig) -> Result<RunOutput, RunError> {
    let bars = resolve_bars(&config.data)?;
    let hash = dataset_hash(&bars);
    let run_id = config.run_id();

    let outcome = BacktestEngine::new(&bars, config.strategy.clone(), config.tie_break)?.run()?;
    let report = PerformanceReport::new(&outcome, &bars)?;

    let artifacts_dir = match &config.artifacts_dir {
        Some(dir) => {
            write_artifacts(dir, config, &run_id, &hash, &bars, &outcome, &report)?;
            Some(dir.clone())
        }
        None => None,
    };

    Ok(RunOutput {
        run_id,
        bars,
        dataset_hash: hash,
        outcome,
        report,
        artifacts_dir,
    })
}

/// Write the full artifact set for a finished run into `dir`.
fn write_artifacts(
    dir: &Path,
    config: &RunConfig,
    run_id: &str,
    hash: &str,
    bars: &[MarketBar],
    outcome: &BacktestOutcome,
    report: &PerformanceReport,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifacts dir {}", dir.display()))?;

    let records = transaction_records(outcome);
    write_trades_csv(&dir.join("trades.csv"), &records)?;
    write_trades_json(&dir.join("trades.json"), &records)?;
    write_equity_csv(&dir.join("equity.csv"), &equity_curve(outcome, bars))?;
    write_report_json(&dir.join("report.json"), report)?;
    std::fs::write(dir.join("report.txt"), report.render())
        .with_context(|| format!("failed to write report.txt in {}", dir.display()))?;

    let manifest = RunManifest {
        run_id: run_id.to_string(),
        created_at: chrono::Utc::now(),
        dataset_hash: hash.to_string(),
        bar_count: bars.len(),
        start_date: report.start_date,
        end_date: report.end_date,
        config: config.strategy.clone(),
        tie_break: config.tie_break,
        total_trades: outcome.trades.len(),
        final_balance: outcome.final_balance,
    };
    write_manifest_json(&dir.join("manifest.json"), &manifest)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fearfade_core::config::StrategyConfig;
    use fearfade_core::execution::ExitTieBreak;

    fn synthetic_config() -> RunConfig {
        RunConfig {
            data: DataConfig::Synthetic {
                seed: "runner-test".into(),
                start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                bars: 120,
            },
            strategy: StrategyConfig::new(10_000.0, 30.0, 70.0),
            tie_break: ExitTieBreak::default(),
            artifacts_dir: None,
        }
    }

    #[test]
    fn synthetic_run_completes() {
        let output = execute(&synthetic_config()).unwrap();

        assert_eq!(output.bars.len(), 120);
        assert_eq!(output.outcome.signals.len(), 120);
        assert!(!output.run_id.is_empty());
        assert!(!output.dataset_hash.is_empty());
        assert!(output.artifacts_dir.is_none());
        // balance conservation survives orchestration
        let total: f64 = output
            .outcome
            .trades
            .iter()
            .map(|t| t.realized_return)
            .sum();
        assert!((output.outcome.final_balance - (10_000.0 + total)).abs() < 1e-6);
    }

    #[test]
    fn identical_configs_reproduce_identical_runs() {
        let a = execute(&synthetic_config()).unwrap();
        let b = execute(&synthetic_config()).unwrap();

        assert_eq!(a.run_id, b.run_id);
        assert_eq!(a.dataset_hash, b.dataset_hash);
        assert_eq!(a.outcome, b.outcome);
    }

    #[test]
    fn empty_synthetic_series_is_an_engine_error() {
        let mut config = synthetic_config();
        config.data = DataConfig::Synthetic {
            seed: "runner-test".into(),
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            bars: 0,
        };
        let err = execute(&config).unwrap_err();
        assert!(matches!(err, RunError::Engine(_)));
    }

    #[test]
    fn artifacts_land_in_the_requested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = synthetic_config();
        config.artifacts_dir = Some(dir.path().join("out"));

        let output = execute(&config).unwrap();
        let out = output.artifacts_dir.unwrap();

        for name in [
            "trades.csv",
            "trades.json",
            "equity.csv",
            "report.json",
            "report.txt",
            "manifest.json",
        ] {
            assert!(out.join(name).is_file(), "missing artifact {name}");
        }

        let rendered = std::fs::read_to_string(out.join("report.txt")).unwrap();
        assert!(rendered.starts_with("Backtest Report \n"));
    }
}
