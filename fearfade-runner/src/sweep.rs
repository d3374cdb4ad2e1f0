//! Threshold sweep — grid search over buy/sell sentiment thresholds.
//!
//! Each grid cell is an independent engine run over the same pre-loaded
//! bar series, so cells run in parallel with no shared state. Rows come
//! back in grid order regardless of scheduling; ranking is a separate
//! accessor.

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use fearfade_core::config::StrategyConfig;
use fearfade_core::domain::MarketBar;
use fearfade_core::engine::{BacktestEngine, EngineError};
use fearfade_core::execution::ExitTieBreak;

use crate::report::win_rate_pct;

/// Threshold combinations to test. A combination where the buy threshold
/// does not sit strictly below the sell threshold is skipped — it would
/// buy greed and sell fear.
#[derive(Debug, Clone)]
pub struct ThresholdGrid {
    pub buy_thresholds: Vec<f64>,
    pub sell_thresholds: Vec<f64>,
}

impl ThresholdGrid {
    /// The default contrarian grid: buys deep in fear, sells deep in
    /// greed, stepped in fives around the conventional 20/70 pair.
    pub fn contrarian_default() -> Self {
        Self {
            buy_thresholds: vec![15.0, 20.0, 25.0, 30.0],
            sell_thresholds: vec![65.0, 70.0, 75.0, 80.0],
        }
    }

    /// Upper bound on the number of combinations, before invalid pairs
    /// are skipped.
    pub fn size(&self) -> usize {
        self.buy_thresholds.len() * self.sell_thresholds.len()
    }

    /// All valid strategy configs in the grid, varying only the two
    /// thresholds of `base`.
    pub fn generate_configs(&self, base: &StrategyConfig) -> Vec<StrategyConfig> {
        let mut configs = Vec::new();
        for &buy in &self.buy_thresholds {
            for &sell in &self.sell_thresholds {
                if buy >= sell {
                    continue;
                }
                let mut config = base.clone();
                config.buy_threshold = buy;
                config.sell_threshold = sell;
                configs.push(config);
            }
        }
        configs
    }
}

/// Headline figures for one grid cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRow {
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub total_trades: usize,
    pub win_rate_pct: Option<f64>,
    pub final_balance: f64,
    pub total_return_pct: f64,
}

/// Run every valid grid cell over the same bar series, in parallel.
pub fn run_sweep(
    bars: &[MarketBar],
    base: &StrategyConfig,
    grid: &ThresholdGrid,
    tie_break: ExitTieBreak,
) -> Result<SweepResults, EngineError> {
    let configs = grid.generate_configs(base);
    let rows = configs
        .par_iter()
        .map(|config| {
            let outcome = BacktestEngine::new(bars, config.clone(), tie_break)?.run()?;
            let winners = outcome.trades.iter().filter(|t| t.is_winner()).count();
            Ok(SweepRow {
                buy_threshold: config.buy_threshold,
                sell_threshold: config.sell_threshold,
                total_trades: outcome.trades.len(),
                win_rate_pct: win_rate_pct(winners, outcome.trades.len()).ok(),
                final_balance: outcome.final_balance,
                total_return_pct: (outcome.final_balance - outcome.initial_balance)
                    / outcome.initial_balance
                    * 100.0,
            })
        })
        .collect::<Result<Vec<_>, EngineError>>()?;
    Ok(SweepResults { rows })
}

/// Results from one sweep, in grid order.
#[derive(Debug)]
pub struct SweepResults {
    rows: Vec<SweepRow>,
}

impl SweepResults {
    pub fn all(&self) -> &[SweepRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows sorted by final balance, best first.
    pub fn ranked(&self) -> Vec<&SweepRow> {
        let mut sorted: Vec<&SweepRow> = self.rows.iter().collect();
        sorted.sort_by(|a, b| {
            b.final_balance
                .partial_cmp(&a.final_balance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }

    pub fn top_n(&self, n: usize) -> Vec<&SweepRow> {
        self.ranked().into_iter().take(n).collect()
    }

    pub fn best(&self) -> Option<&SweepRow> {
        self.ranked().into_iter().next()
    }
}

/// Export sweep rows as CSV, in ranked order.
pub fn write_sweep_csv(path: &Path, results: &SweepResults) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("failed to create sweep CSV {}", path.display()))?;
    writeln!(
        file,
        "buy_threshold,sell_threshold,total_trades,win_rate_pct,final_balance,total_return_pct"
    )?;
    for row in results.ranked() {
        let win_rate = row
            .win_rate_pct
            .map(|w| format!("{w:.2}"))
            .unwrap_or_default();
        writeln!(
            file,
            "{},{},{},{},{:.4},{:.4}",
            row.buy_threshold,
            row.sell_threshold,
            row.total_trades,
            win_rate,
            row.final_balance,
            row.total_return_pct
        )?;
    }
    Ok(())
}
