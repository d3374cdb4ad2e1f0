//! FearFade CLI — backtest, sweep, and dataset commands.
//!
//! Commands:
//! - `run` — execute a backtest from a TOML config file or a bar CSV
//! - `sweep` — grid-search buy/sell thresholds in parallel and rank the cells
//! - `synth` — write a deterministic synthetic dataset as CSV

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use fearfade_core::config::StrategyConfig;
use fearfade_core::domain::SentimentRating;
use fearfade_core::execution::ExitTieBreak;
use fearfade_runner::{
    execute, generate_synthetic_bars, resolve_bars, run_sweep, write_bars_csv, write_sweep_csv,
    DataConfig, RunConfig, RunOutput, SweepResults, ThresholdGrid,
};

#[derive(Parser)]
#[command(
    name = "fearfade",
    about = "FearFade CLI — contrarian sentiment backtesting engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file or a bar CSV.
    Run {
        /// Path to a TOML run config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to a bar CSV with a date,open,high,low,close,sentiment header.
        #[arg(long)]
        data: Option<PathBuf>,

        /// Starting account balance (with --data).
        #[arg(long, default_value_t = 10_000.0)]
        balance: f64,

        /// Buy when sentiment drops to this score or below (with --data).
        #[arg(long, default_value_t = 20.0)]
        buy_threshold: f64,

        /// Sell when sentiment reaches this score or above (with --data).
        #[arg(long, default_value_t = 70.0)]
        sell_threshold: f64,

        /// Reward-to-risk ratio for the take-profit leg (with --data).
        #[arg(long, default_value_t = 3.0)]
        risk_reward: f64,

        /// Stop distance as a fraction of the open price (with --data).
        #[arg(long, default_value_t = 0.03)]
        loss_buffer: f64,

        /// Fraction of the balance risked per trade (with --data).
        #[arg(long, default_value_t = 0.01)]
        risk_per_trade: f64,

        /// Tie-break when one bar touches both exit levels:
        /// take-profit-first or stop-loss-first (with --data).
        #[arg(long, default_value = "take-profit-first")]
        tie_break: String,

        /// Print the report as JSON instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Write run artifacts (trades, equity, report, manifest) into this directory.
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },
    /// Grid-search buy/sell thresholds in parallel and print a ranked table.
    Sweep {
        /// Path to a TOML run config supplying the data source and base strategy.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to a bar CSV with a date,open,high,low,close,sentiment header.
        #[arg(long)]
        data: Option<PathBuf>,

        /// Starting account balance (with --data).
        #[arg(long, default_value_t = 10_000.0)]
        balance: f64,

        /// Comma-separated buy thresholds. Defaults to 15,20,25,30.
        #[arg(long)]
        buy_thresholds: Option<String>,

        /// Comma-separated sell thresholds. Defaults to 65,70,75,80.
        #[arg(long)]
        sell_thresholds: Option<String>,

        /// Tie-break applied to every cell (with --data).
        #[arg(long, default_value = "take-profit-first")]
        tie_break: String,

        /// Show only the best N rows (0 shows all).
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Write the ranked table as CSV.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write a deterministic synthetic dataset as CSV.
    Synth {
        /// Output CSV path.
        #[arg(long)]
        out: PathBuf,

        /// Number of trading days to generate.
        #[arg(long, default_value_t = 252)]
        bars: usize,

        /// Generator seed; the same seed always produces the same series.
        #[arg(long, default_value = "fearfade")]
        seed: String,

        /// First calendar date (YYYY-MM-DD). Weekends are skipped.
        #[arg(long, default_value = "2020-01-02")]
        start: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data,
            balance,
            buy_threshold,
            sell_threshold,
            risk_reward,
            loss_buffer,
            risk_per_trade,
            tie_break,
            json,
            artifacts,
        } => run_backtest_cmd(
            config,
            data,
            balance,
            buy_threshold,
            sell_threshold,
            risk_reward,
            loss_buffer,
            risk_per_trade,
            tie_break,
            json,
            artifacts,
        ),
        Commands::Sweep {
            config,
            data,
            balance,
            buy_thresholds,
            sell_thresholds,
            tie_break,
            top,
            out,
        } => run_sweep_cmd(
            config,
            data,
            balance,
            buy_thresholds,
            sell_thresholds,
            tie_break,
            top,
            out,
        ),
        Commands::Synth {
            out,
            bars,
            seed,
            start,
        } => run_synth(out, bars, seed, start),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_backtest_cmd(
    config_path: Option<PathBuf>,
    data_path: Option<PathBuf>,
    balance: f64,
    buy_threshold: f64,
    sell_threshold: f64,
    risk_reward: f64,
    loss_buffer: f64,
    risk_per_trade: f64,
    tie_break: String,
    json: bool,
    artifacts: Option<PathBuf>,
) -> Result<()> {
    // Validate mutually exclusive options
    if config_path.is_some() && data_path.is_some() {
        bail!("--config and --data are mutually exclusive");
    }
    if config_path.is_none() && data_path.is_none() {
        bail!("one of --config or --data is required");
    }

    let mut run_config = if let Some(path) = config_path {
        RunConfig::from_toml_file(&path)?
    } else {
        let path = data_path.unwrap();
        let strategy = StrategyConfig {
            initial_balance: balance,
            buy_threshold,
            sell_threshold,
            risk_reward_ratio: risk_reward,
            loss_buffer_pct: loss_buffer,
            risk_per_trade_pct: risk_per_trade,
        };
        RunConfig {
            data: DataConfig::Csv { path },
            strategy,
            tie_break: parse_tie_break(&tie_break)?,
            artifacts_dir: None,
        }
    };

    // --artifacts overrides whatever the config file says.
    if let Some(dir) = artifacts {
        run_config.artifacts_dir = Some(dir);
    }

    let output = execute(&run_config)?;

    if json {
        print_json(&output)?;
    } else {
        print_run(&output);
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_sweep_cmd(
    config_path: Option<PathBuf>,
    data_path: Option<PathBuf>,
    balance: f64,
    buy_thresholds: Option<String>,
    sell_thresholds: Option<String>,
    tie_break: String,
    top: usize,
    out: Option<PathBuf>,
) -> Result<()> {
    if config_path.is_some() && data_path.is_some() {
        bail!("--config and --data are mutually exclusive");
    }
    if config_path.is_none() && data_path.is_none() {
        bail!("one of --config or --data is required");
    }

    let (data, base, tie_break) = if let Some(path) = config_path {
        let config = RunConfig::from_toml_file(&path)?;
        (config.data, config.strategy, config.tie_break)
    } else {
        let path = data_path.unwrap();
        // Thresholds in the base config are placeholders; the grid
        // overrides them cell by cell.
        (
            DataConfig::Csv { path },
            StrategyConfig::new(balance, 20.0, 70.0),
            parse_tie_break(&tie_break)?,
        )
    };

    let bars = resolve_bars(&data)?;

    let defaults = ThresholdGrid::contrarian_default();
    let grid = ThresholdGrid {
        buy_thresholds: match buy_thresholds {
            Some(raw) => parse_thresholds(&raw)?,
            None => defaults.buy_thresholds,
        },
        sell_thresholds: match sell_thresholds {
            Some(raw) => parse_thresholds(&raw)?,
            None => defaults.sell_thresholds,
        },
    };

    let results = run_sweep(&bars, &base, &grid, tie_break)?;
    print_sweep(&results, top);

    if let Some(path) = out {
        write_sweep_csv(&path, &results)?;
        println!("Sweep table saved to: {}", path.display());
    }

    Ok(())
}

fn run_synth(out: PathBuf, bars: usize, seed: String, start: String) -> Result<()> {
    let start_date = NaiveDate::parse_from_str(&start, "%Y-%m-%d")?;
    let series = generate_synthetic_bars(&seed, start_date, bars);
    write_bars_csv(&out, &series)?;

    match (series.first(), series.last()) {
        (Some(first), Some(last)) => println!(
            "Wrote {} bars ({} to {}) to {}",
            series.len(),
            first.date,
            last.date,
            out.display()
        ),
        _ => println!("Wrote 0 bars to {}", out.display()),
    }

    Ok(())
}

fn parse_tie_break(raw: &str) -> Result<ExitTieBreak> {
    raw.parse::<ExitTieBreak>().map_err(anyhow::Error::msg)
}

fn parse_thresholds(raw: &str) -> Result<Vec<f64>> {
    raw.split(',')
        .map(|part| {
            let trimmed = part.trim();
            trimmed
                .parse::<f64>()
                .with_context(|| format!("invalid threshold '{trimmed}'"))
        })
        .collect()
}

fn print_run(output: &RunOutput) {
    println!("Run ID: {}", output.run_id);
    println!();
    print!("{}", output.report.render());

    if let Some(last) = output.bars.last() {
        let rating = SentimentRating::from_score(last.sentiment);
        println!();
        println!(
            "Latest Sentiment: {:.1} ({}) on {}",
            last.sentiment, rating, last.date
        );
    }

    if let Some(dir) = &output.artifacts_dir {
        println!();
        println!("Artifacts saved to: {}", dir.display());
    }
}

fn print_json(output: &RunOutput) -> Result<()> {
    let payload = serde_json::json!({
        "run_id": output.run_id,
        "dataset_hash": output.dataset_hash,
        "report": output.report,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn print_sweep(results: &SweepResults, top: usize) {
    let ranked = results.ranked();
    let shown = if top == 0 { ranked.len() } else { top.min(ranked.len()) };

    println!();
    println!("=== Threshold Sweep: {} cells ===", results.len());
    println!(
        "{:>4} {:>6} {:>6} {:>7} {:>7} {:>14} {:>9}",
        "Rank", "Buy", "Sell", "Trades", "Win %", "Final Balance", "Return %"
    );
    println!("{}", "-".repeat(59));
    for (idx, row) in ranked.iter().take(shown).enumerate() {
        let win_rate = match row.win_rate_pct {
            Some(rate) => format!("{rate:.1}"),
            None => "n/a".to_string(),
        };
        println!(
            "{:>4} {:>6.0} {:>6.0} {:>7} {:>7} {:>14.2} {:>9.2}",
            idx + 1,
            row.buy_threshold,
            row.sell_threshold,
            row.total_trades,
            win_rate,
            row.final_balance,
            row.total_return_pct
        );
    }
    if shown < ranked.len() {
        println!("({} more not shown)", ranked.len() - shown);
    }
}
