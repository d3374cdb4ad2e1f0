//! Run artifacts: transaction log, equity curve, report JSON, manifest.
//!
//! Builders here are pure; the `write_*` functions put the results on
//! disk. The transaction log keeps trades in the order they closed, so
//! its running equity column is the actual balance trajectory of the
//! run, ending at the outcome's final balance.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use fearfade_core::config::StrategyConfig;
use fearfade_core::domain::{MarketBar, TradeSide};
use fearfade_core::engine::BacktestOutcome;
use fearfade_core::execution::ExitTieBreak;

use crate::report::PerformanceReport;

/// One closed trade plus the balance after it settled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub open_date: NaiveDate,
    pub open_price: f64,
    pub side: TradeSide,
    pub shares: u64,
    pub close_date: NaiveDate,
    pub close_price: f64,
    pub realized_return: f64,
    pub pct_return: f64,
    pub duration_days: i64,
    pub max_drawdown: f64,
    pub pct_max_drawdown: f64,
    pub equity_balance: f64,
}

/// The transaction log, one row per closed trade with a running equity
/// balance accumulated from the initial balance.
pub fn transaction_records(outcome: &BacktestOutcome) -> Vec<TransactionRecord> {
    let mut equity = outcome.initial_balance;
    outcome
        .trades
        .iter()
        .map(|trade| {
            equity += trade.realized_return;
            TransactionRecord {
                open_date: trade.open_date,
                open_price: trade.open_price,
                side: trade.side,
                shares: trade.shares,
                close_date: trade.close_date,
                close_price: trade.close_price,
                realized_return: trade.realized_return,
                pct_return: trade.pct_return,
                duration_days: trade.duration_days,
                max_drawdown: trade.max_drawdown,
                pct_max_drawdown: trade.pct_max_drawdown,
                equity_balance: equity,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// The balance path: the initial balance on the first bar, a point per
/// settled trade, and the final balance on the last bar.
pub fn equity_curve(outcome: &BacktestOutcome, bars: &[MarketBar]) -> Vec<EquityPoint> {
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return Vec::new();
    };
    let mut points = vec![EquityPoint {
        date: first.date,
        equity: outcome.initial_balance,
    }];
    for record in transaction_records(outcome) {
        points.push(EquityPoint {
            date: record.close_date,
            equity: record.equity_balance,
        });
    }
    points.push(EquityPoint {
        date: last.date,
        equity: outcome.final_balance,
    });
    points
}

/// What produced a set of artifacts: the run's configuration, its input
/// fingerprint, and the headline result.
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub dataset_hash: String,
    pub bar_count: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub config: StrategyConfig,
    pub tie_break: ExitTieBreak,
    pub total_trades: usize,
    pub final_balance: f64,
}

pub fn write_trades_csv(path: &Path, records: &[TransactionRecord]) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("failed to create trades CSV {}", path.display()))?;

    writeln!(
        file,
        "open_date,open_price,side,shares,close_date,close_price,realized_return,pct_return,duration_days,max_drawdown,pct_max_drawdown,equity_balance"
    )?;
    for r in records {
        writeln!(
            file,
            "{},{:.2},{},{},{},{:.2},{:.4},{:.4},{},{:.4},{:.4},{:.4}",
            r.open_date,
            r.open_price,
            r.side.as_str(),
            r.shares,
            r.close_date,
            r.close_price,
            r.realized_return,
            r.pct_return,
            r.duration_days,
            r.max_drawdown,
            r.pct_max_drawdown,
            r.equity_balance
        )?;
    }
    Ok(())
}

pub fn write_trades_json(path: &Path, records: &[TransactionRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records).context("failed to serialize trades")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write trades JSON {}", path.display()))?;
    Ok(())
}

pub fn write_equity_csv(path: &Path, points: &[EquityPoint]) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("failed to create equity CSV {}", path.display()))?;
    writeln!(file, "date,equity")?;
    for point in points {
        writeln!(file, "{},{:.4}", point.date, point.equity)?;
    }
    Ok(())
}

pub fn write_report_json(path: &Path, report: &PerformanceReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report JSON {}", path.display()))?;
    Ok(())
}

pub fn write_manifest_json(path: &Path, manifest: &RunManifest) -> Result<()> {
    let json = serde_json::to_string_pretty(manifest).context("failed to serialize manifest")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write manifest {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fearfade_core::engine::BacktestEngine;

    fn bar(d: u32, open: f64, high: f64, low: f64, close: f64, s: f64) -> MarketBar {
        MarketBar::new(
            NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
            open,
            high,
            low,
            close,
            s,
        )
    }

    fn golden() -> (BacktestOutcome, Vec<MarketBar>) {
        let bars = vec![
            bar(2, 100.0, 102.0, 99.0, 101.0, 10.0),
            bar(3, 101.0, 103.0, 98.0, 102.0, 50.0),
            bar(4, 102.0, 104.0, 101.0, 103.0, 80.0),
        ];
        let outcome = BacktestEngine::new(
            &bars,
            StrategyConfig::new(10_000.0, 20.0, 70.0),
            ExitTieBreak::default(),
        )
        .unwrap()
        .run()
        .unwrap();
        (outcome, bars)
    }

    #[test]
    fn equity_column_accumulates_to_final_balance() {
        let (outcome, _) = golden();
        let records = transaction_records(&outcome);

        assert_eq!(records.len(), 2);
        assert!((records[0].equity_balance - 10_099.0).abs() < 1e-9);
        assert!((records[1].equity_balance - 10_067.0).abs() < 1e-9);
        assert!((records.last().unwrap().equity_balance - outcome.final_balance).abs() < 1e-9);
    }

    #[test]
    fn equity_curve_brackets_the_run() {
        let (outcome, bars) = golden();
        let points = equity_curve(&outcome, &bars);

        assert_eq!(points.len(), 4);
        assert_eq!(points[0].date, bars[0].date);
        assert!((points[0].equity - 10_000.0).abs() < 1e-9);
        assert_eq!(points.last().unwrap().date, bars[2].date);
        assert!((points.last().unwrap().equity - 10_067.0).abs() < 1e-9);
    }

    #[test]
    fn equity_curve_of_tradeless_run_is_flat() {
        let bars = vec![
            bar(2, 100.0, 101.0, 99.0, 100.0, 50.0),
            bar(3, 100.0, 101.0, 99.0, 100.0, 50.0),
        ];
        let outcome = BacktestEngine::new(
            &bars,
            StrategyConfig::new(10_000.0, 20.0, 70.0),
            ExitTieBreak::default(),
        )
        .unwrap()
        .run()
        .unwrap();
        let points = equity_curve(&outcome, &bars);

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].equity, points[1].equity);
    }

    #[test]
    fn trades_csv_layout() {
        let (outcome, _) = golden();
        let records = transaction_records(&outcome);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");

        write_trades_csv(&path, &records).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("open_date,open_price,side"));
        assert!(lines[1].starts_with("2024-01-02,100.00,Long,33,2024-01-04,103.00,99.0000"));
        assert!(lines[2].contains("Short,32"));
    }

    #[test]
    fn trades_json_roundtrips_fields() {
        let (outcome, _) = golden();
        let records = transaction_records(&outcome);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.json");

        write_trades_json(&path, &records).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[0]["side"], "Long");
        assert_eq!(parsed[0]["shares"], 33);
        assert_eq!(parsed[1]["side"], "Short");
    }

    #[test]
    fn report_json_is_written() {
        let (outcome, bars) = golden();
        let report = PerformanceReport::new(&outcome, &bars).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        write_report_json(&path, &report).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(parsed["total_trades"], 2);
        assert!((parsed["final_balance"].as_f64().unwrap() - 10_067.0).abs() < 1e-9);
        // degenerate metrics serialize as null, not NaN
        assert!(parsed["annualised_return_pct"].is_null());
    }

    #[test]
    fn manifest_json_carries_run_identity() {
        let (outcome, bars) = golden();
        let manifest = RunManifest {
            run_id: "abc123".into(),
            created_at: Utc::now(),
            dataset_hash: crate::data_loader::dataset_hash(&bars),
            bar_count: bars.len(),
            start_date: bars[0].date,
            end_date: bars[2].date,
            config: StrategyConfig::new(10_000.0, 20.0, 70.0),
            tie_break: ExitTieBreak::default(),
            total_trades: outcome.trades.len(),
            final_balance: outcome.final_balance,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");

        write_manifest_json(&path, &manifest).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(parsed["run_id"], "abc123");
        assert_eq!(parsed["bar_count"], 3);
        assert_eq!(parsed["tie_break"], "take_profit_first");
        assert_eq!(parsed["config"]["buy_threshold"], 20.0);
    }
}
