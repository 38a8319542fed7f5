//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files with environment
//! variable overrides for the regime thresholds.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Rejected threshold combinations
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("range_threshold ({range}) must be below trend_threshold ({trend})")]
    InvertedAdxThresholds { range: f64, trend: f64 },

    #[error("min_regime_duration_secs must be a finite, non-negative number, got {0}")]
    InvalidMinDuration(f64),

    #[error(
        "volatility thresholds must be finite and strictly increasing: medium={medium}, high={high}, extreme={extreme}"
    )]
    UnorderedVolatilityThresholds { medium: f64, high: f64, extreme: f64 },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub regime: RegimeConfig,
    #[serde(default)]
    pub volatility: VolatilityConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a config file
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Override regime thresholds from the environment (and `.env`, if present)
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        dotenv::dotenv().ok();

        if let Some(v) = env_f64("REGIME_TREND_THRESHOLD")? {
            debug!("REGIME_TREND_THRESHOLD override: {}", v);
            self.regime.trend_threshold = v;
        }
        if let Some(v) = env_f64("REGIME_RANGE_THRESHOLD")? {
            debug!("REGIME_RANGE_THRESHOLD override: {}", v);
            self.regime.range_threshold = v;
        }
        if let Some(v) = env_f64("REGIME_MIN_DURATION_SECS")? {
            debug!("REGIME_MIN_DURATION_SECS override: {}", v);
            self.regime.min_regime_duration_secs = v;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.regime.validate()?;
        self.volatility.validate()
    }
}

fn env_f64(key: &str) -> Result<Option<f64>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .with_context(|| format!("Failed to parse {} as a number: {:?}", key, raw)),
        Err(_) => Ok(None),
    }
}

/// ADX thresholds and hysteresis window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// ADX at or above this is TREND
    pub trend_threshold: f64,
    /// ADX at or below this is RANGE
    pub range_threshold: f64,
    /// Minimum dwell time before a regime switch is honored
    pub min_regime_duration_secs: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        RegimeConfig {
            trend_threshold: 25.0,
            range_threshold: 20.0,
            min_regime_duration_secs: 300.0,
        }
    }
}

impl RegimeConfig {
    pub fn with_min_duration(mut self, secs: f64) -> Self {
        self.min_regime_duration_secs = secs;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.range_threshold < self.trend_threshold) {
            return Err(ConfigError::InvertedAdxThresholds {
                range: self.range_threshold,
                trend: self.trend_threshold,
            });
        }
        if !self.min_regime_duration_secs.is_finite() || self.min_regime_duration_secs < 0.0 {
            return Err(ConfigError::InvalidMinDuration(
                self.min_regime_duration_secs,
            ));
        }
        Ok(())
    }
}

/// ATR % of price boundaries; each is the inclusive lower edge of its bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityConfig {
    pub medium_pct: f64,
    pub high_pct: f64,
    pub extreme_pct: f64,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        VolatilityConfig {
            medium_pct: 0.5,
            high_pct: 1.5,
            extreme_pct: 3.0,
        }
    }
}

impl VolatilityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = self.medium_pct.is_finite()
            && self.high_pct.is_finite()
            && self.extreme_pct.is_finite();
        if !finite || !(self.medium_pct < self.high_pct && self.high_pct < self.extreme_pct) {
            return Err(ConfigError::UnorderedVolatilityThresholds {
                medium: self.medium_pct,
                high: self.high_pct,
                extreme: self.extreme_pct,
            });
        }
        Ok(())
    }
}

/// Replay input/output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub data_dir: String,
    pub results_dir: String,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        ReplayConfig {
            data_dir: "data".to_string(),
            results_dir: "results".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.regime.trend_threshold, 25.0);
        assert_eq!(config.regime.range_threshold, 20.0);
        assert_eq!(config.regime.min_regime_duration_secs, 300.0);
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "regime": { "min_regime_duration_secs": 60 } }"#).unwrap();
        assert_eq!(config.regime.min_regime_duration_secs, 60.0);
        assert_eq!(config.regime.trend_threshold, 25.0);
        assert_eq!(config.volatility.extreme_pct, 3.0);
        assert_eq!(config.replay.data_dir, "data");
    }

    #[test]
    fn test_inverted_adx_thresholds_rejected() {
        let regime = RegimeConfig {
            trend_threshold: 20.0,
            range_threshold: 25.0,
            ..Default::default()
        };
        assert_eq!(
            regime.validate(),
            Err(ConfigError::InvertedAdxThresholds {
                range: 25.0,
                trend: 20.0
            })
        );
    }

    #[test]
    fn test_negative_min_duration_rejected() {
        let regime = RegimeConfig::default().with_min_duration(-1.0);
        assert_eq!(regime.validate(), Err(ConfigError::InvalidMinDuration(-1.0)));
        let regime = RegimeConfig::default().with_min_duration(0.0);
        assert!(regime.validate().is_ok());
    }

    #[test]
    fn test_unordered_volatility_thresholds_rejected() {
        let vol = VolatilityConfig {
            medium_pct: 1.5,
            high_pct: 1.5,
            extreme_pct: 3.0,
        };
        assert!(matches!(
            vol.validate(),
            Err(ConfigError::UnorderedVolatilityThresholds { .. })
        ));
    }
}
