//! Serializable run configuration.
//!
//! A `RunConfig` captures everything needed to reproduce a backtest: the
//! data source, the strategy parameters, and the execution tie-break.
//! Its `run_id` is a content hash, so identical configs name identical
//! runs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use fearfade_core::config::StrategyConfig;
use fearfade_core::execution::ExitTieBreak;

/// Unique identifier for a run (content-addressable hash).
pub type RunId = String;

/// Where the bar series comes from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataConfig {
    /// A CSV file with a `date,open,high,low,close,sentiment` header.
    Csv { path: PathBuf },

    /// Deterministic synthetic bars, for development and demos.
    Synthetic {
        seed: String,
        start: NaiveDate,
        bars: usize,
    },
}

/// One complete backtest run, as read from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    pub data: DataConfig,

    pub strategy: StrategyConfig,

    /// Bracket resolution when one bar touches both exit levels.
    #[serde(default)]
    pub tie_break: ExitTieBreak,

    /// Directory to write run artifacts into. `None` skips artifacts.
    #[serde(default)]
    pub artifacts_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("cannot read config {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl RunConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigFileError> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: display.clone(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigFileError::Parse {
            path: display,
            source,
        })
    }

    /// Deterministic hash of the whole configuration. Two runs with the
    /// same id are the same run (given the same input data).
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).expect("RunConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
