//! Engine configuration.
//!
//! One immutable `EngineConfig` value is built at start-up (defaults, or a
//! TOML document overriding some of them), validated, and handed to the
//! engine. Nothing reads configuration from global state.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alerts::AlertThresholds;
use crate::schedule::{ReviewCadence, TriggerWindows};
use crate::scoring::{DiscountRateConfig, LevelThresholds, RiskWeights};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid risk weights: {0}")]
    InvalidWeights(String),

    #[error("invalid level thresholds: {0}")]
    InvalidThresholds(String),

    #[error("invalid discount rate configuration: {0}")]
    InvalidDiscountRates(String),

    #[error("invalid alert thresholds: {0}")]
    InvalidAlertThresholds(String),

    #[error("invalid review cadence: {0}")]
    InvalidCadence(String),

    #[error("invalid trigger windows: {0}")]
    InvalidTriggerWindows(String),

    #[error("invalid batch configuration: {0}")]
    InvalidBatch(String),

    #[error("configuration file error: {0}")]
    File(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Batch recalculation and provider-call settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Entities calculated concurrently per group.
    pub concurrency: usize,
    /// Pause between groups, to respect provider rate limits.
    pub pause_ms: u64,
    /// Timeout applied to each external provider call.
    pub provider_timeout_ms: u64,
    pub weather_forecast_days: u32,
    pub news_window_days: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            concurrency: 5,
            pause_ms: 1_000,
            provider_timeout_ms: 10_000,
            weather_forecast_days: 7,
            news_window_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub weights: RiskWeights,
    pub thresholds: LevelThresholds,
    pub discount: DiscountRateConfig,
    pub alerts: AlertThresholds,
    pub cadence: ReviewCadence,
    pub triggers: TriggerWindows,
    pub batch: BatchConfig,
    /// External market adjustment added to every discount rate.
    pub market_adjustment: f64,
}

impl EngineConfig {
    pub fn canonical() -> Self {
        Self::default()
    }

    /// Parse a TOML document; absent tables and fields keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::File(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        self.thresholds.validate()?;
        self.discount.validate()?;
        self.alerts.validate()?;
        self.cadence.validate()?;
        self.triggers.validate()?;
        if self.batch.concurrency == 0 {
            return Err(ConfigError::InvalidBatch("concurrency must be at least 1".to_string()));
        }
        if self.batch.provider_timeout_ms == 0 {
            return Err(ConfigError::InvalidBatch("provider_timeout_ms must be positive".to_string()));
        }
        if !self.market_adjustment.is_finite() {
            return Err(ConfigError::InvalidDiscountRates(format!(
                "market adjustment {} is not finite",
                self.market_adjustment
            )));
        }
        Ok(())
    }
}
