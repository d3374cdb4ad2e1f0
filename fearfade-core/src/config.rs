//! Strategy parameters, validated before the engine runs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

fn default_risk_reward_ratio() -> f64 {
    3.0
}

fn default_loss_buffer_pct() -> f64 {
    0.03
}

fn default_risk_per_trade_pct() -> f64 {
    0.01
}

/// Contrarian strategy parameters.
///
/// A Buy fires when sentiment drops to `buy_threshold` or below, a Sell
/// when it reaches `sell_threshold` or above. Every position is bracketed:
/// the stop sits `loss_buffer_pct` away from the open, the target
/// `loss_buffer_pct × risk_reward_ratio` away on the other side. Position
/// size risks `risk_per_trade_pct` of the current balance per trade.
///
/// `buy_threshold < sell_threshold` is the sensible arrangement but is not
/// enforced; inverted thresholds just produce a strategy that buys greed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub initial_balance: f64,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    #[serde(default = "default_risk_reward_ratio")]
    pub risk_reward_ratio: f64,
    #[serde(default = "default_loss_buffer_pct")]
    pub loss_buffer_pct: f64,
    #[serde(default = "default_risk_per_trade_pct")]
    pub risk_per_trade_pct: f64,
}

impl StrategyConfig {
    /// Config with the default bracket/risk knobs (3:1 reward-to-risk,
    /// 3% stop buffer, 1% risk per trade).
    pub fn new(initial_balance: f64, buy_threshold: f64, sell_threshold: f64) -> Self {
        Self {
            initial_balance,
            buy_threshold,
            sell_threshold,
            risk_reward_ratio: default_risk_reward_ratio(),
            loss_buffer_pct: default_loss_buffer_pct(),
            risk_per_trade_pct: default_risk_per_trade_pct(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("initial_balance", self.initial_balance),
            ("buy_threshold", self.buy_threshold),
            ("sell_threshold", self.sell_threshold),
            ("risk_reward_ratio", self.risk_reward_ratio),
            ("loss_buffer_pct", self.loss_buffer_pct),
            ("risk_per_trade_pct", self.risk_per_trade_pct),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name, value });
            }
        }
        if self.initial_balance <= 0.0 {
            return Err(ConfigError::NonPositiveBalance(self.initial_balance));
        }
        if self.risk_reward_ratio <= 0.0 {
            return Err(ConfigError::NonPositiveRiskReward(self.risk_reward_ratio));
        }
        if self.loss_buffer_pct <= 0.0 || self.loss_buffer_pct >= 1.0 {
            return Err(ConfigError::LossBufferOutOfRange(self.loss_buffer_pct));
        }
        if self.risk_per_trade_pct <= 0.0 || self.risk_per_trade_pct > 1.0 {
            return Err(ConfigError::RiskPerTradeOutOfRange(self.risk_per_trade_pct));
        }
        Ok(())
    }
}

/// Parameter bound violations, fatal at engine construction.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("initial_balance must be positive, got {0}")]
    NonPositiveBalance(f64),

    #[error("risk_reward_ratio must be positive, got {0}")]
    NonPositiveRiskReward(f64),

    #[error("loss_buffer_pct must be a fraction in (0, 1), got {0}")]
    LossBufferOutOfRange(f64),

    #[error("risk_per_trade_pct must be a fraction in (0, 1], got {0}")]
    RiskPerTradeOutOfRange(f64),

    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_knobs() {
        let cfg = StrategyConfig::new(10_000.0, 20.0, 70.0);
        assert_eq!(cfg.risk_reward_ratio, 3.0);
        assert_eq!(cfg.loss_buffer_pct, 0.03);
        assert_eq!(cfg.risk_per_trade_pct, 0.01);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_nonpositive_balance() {
        let cfg = StrategyConfig::new(0.0, 20.0, 70.0);
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::NonPositiveBalance(0.0))
        );
    }

    #[test]
    fn rejects_buffer_of_one_or_more() {
        let mut cfg = StrategyConfig::new(10_000.0, 20.0, 70.0);
        cfg.loss_buffer_pct = 1.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::LossBufferOutOfRange(_))
        ));
    }

    #[test]
    fn rejects_zero_risk_per_trade() {
        let mut cfg = StrategyConfig::new(10_000.0, 20.0, 70.0);
        cfg.risk_per_trade_pct = 0.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::RiskPerTradeOutOfRange(_))
        ));
    }

    #[test]
    fn full_risk_per_trade_is_allowed() {
        let mut cfg = StrategyConfig::new(10_000.0, 20.0, 70.0);
        cfg.risk_per_trade_pct = 1.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_nan_threshold() {
        let mut cfg = StrategyConfig::new(10_000.0, 20.0, 70.0);
        cfg.sell_threshold = f64::NAN;
        assert!(matches!(cfg.validate(), Err(ConfigError::NonFinite { .. })));
    }

    #[test]
    fn inverted_thresholds_are_not_an_error() {
        let cfg = StrategyConfig::new(10_000.0, 70.0, 20.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn serde_fills_defaulted_knobs() {
        let json = r#"{"initial_balance": 5000.0, "buy_threshold": 25.0, "sell_threshold": 75.0}"#;
        let cfg: StrategyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.risk_reward_ratio, 3.0);
        assert_eq!(cfg.loss_buffer_pct, 0.03);
        assert_eq!(cfg.risk_per_trade_pct, 0.01);
    }
}
