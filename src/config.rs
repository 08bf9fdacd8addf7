//! Run configuration
//!
//! Every threshold the pipeline applies lives here so that runs can be
//! exercised at small scale. Defaults reproduce the production settings.

use crate::error::{ChainError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default worker pool size
pub const DEFAULT_WORKERS: usize = 8;

/// Annualized risk-free rate
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.0675;

/// Continuous dividend yield
pub const DEFAULT_DIVIDEND_YIELD: f64 = 0.013;

/// Seed volatility for the implied-vol solver
pub const DEFAULT_INITIAL_VOLATILITY: f64 = 0.15;

/// Strike distance from the underlying inside which repair is attempted
pub const DEFAULT_STRIKE_WINDOW: f64 = 400.0;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub pricing: PricingConfig,
    pub repair: RepairConfig,
    pub retention: RetentionConfig,
}

/// Worker pool and queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the option-chain tree
    pub root: PathBuf,
    /// Number of worker threads
    pub workers: usize,
    /// Work queue bound; `None` sizes it to the enumerated file count
    pub queue_capacity: Option<usize>,
    /// Log progress every N enqueued files
    pub progress_every: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("dataset"),
            workers: DEFAULT_WORKERS,
            queue_capacity: None,
            progress_every: 100,
        }
    }
}

/// Black-Scholes-Merton market parameters and solver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub risk_free_rate: f64,
    pub dividend_yield: f64,
    pub initial_volatility: f64,
    /// Divisor turning days-to-expiry into years
    pub days_per_year: f64,
    /// Absolute price error at which the solver stops
    pub solver_tolerance: f64,
    pub max_iterations: usize,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            dividend_yield: DEFAULT_DIVIDEND_YIELD,
            initial_volatility: DEFAULT_INITIAL_VOLATILITY,
            days_per_year: 365.0,
            solver_tolerance: 1e-8,
            max_iterations: 100,
        }
    }
}

/// How the put-vega field is repaired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VegaPutRule {
    /// Same rule as every primary field
    #[default]
    Uniform,
    /// Historical behaviour: the repair condition doubles as the
    /// irreparability condition, so a repaired put vega is also counted
    /// as irreparable.
    Legacy,
}

/// Neighbor-interpolation thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Half-width of the strike band around the underlying price
    pub strike_window: f64,
    /// Deficiency above this leaves the file unwritten
    pub persist_limit: usize,
    /// Deficiency above this flags the file for deletion
    pub delete_limit: usize,
    pub vega_put_rule: VegaPutRule,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            strike_window: DEFAULT_STRIKE_WINDOW,
            persist_limit: 4,
            delete_limit: 6,
            vega_put_rule: VegaPutRule::Uniform,
        }
    }
}

/// Directory retention policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// A directory is removed once its signal tally exceeds this
    pub directory_threshold: usize,
    /// Record the removal set without touching the filesystem
    pub dry_run: bool,
    /// Keep the run root even when it crosses the threshold
    pub protect_root: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            directory_threshold: 7,
            dry_run: false,
            protect_root: false,
        }
    }
}

impl Config {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.workers == 0 {
            return Err(ChainError::ConfigError(
                "worker count must be positive".to_string(),
            ));
        }
        if self.pipeline.queue_capacity == Some(0) {
            return Err(ChainError::ConfigError(
                "queue capacity must be positive".to_string(),
            ));
        }
        let window = self.repair.strike_window;
        if window.is_nan() || window <= 0.0 {
            return Err(ChainError::ConfigError(format!(
                "strike window must be positive, got {}",
                self.repair.strike_window
            )));
        }

        let pricing = &self.pricing;
        for (name, value) in [
            ("risk_free_rate", pricing.risk_free_rate),
            ("dividend_yield", pricing.dividend_yield),
            ("initial_volatility", pricing.initial_volatility),
            ("days_per_year", pricing.days_per_year),
            ("solver_tolerance", pricing.solver_tolerance),
        ] {
            if !value.is_finite() {
                return Err(ChainError::ConfigError(format!(
                    "{} must be finite, got {}",
                    name, value
                )));
            }
        }
        if pricing.initial_volatility <= 0.0 || pricing.days_per_year <= 0.0 {
            return Err(ChainError::ConfigError(
                "initial volatility and days per year must be positive".to_string(),
            ));
        }
        if pricing.max_iterations == 0 {
            return Err(ChainError::ConfigError(
                "solver needs at least one iteration".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pipeline.workers, 8);
        assert_eq!(config.pricing.risk_free_rate, 0.0675);
        assert_eq!(config.pricing.dividend_yield, 0.013);
        assert_eq!(config.pricing.initial_volatility, 0.15);
        assert_eq!(config.repair.strike_window, 400.0);
        assert_eq!(config.repair.persist_limit, 4);
        assert_eq!(config.repair.delete_limit, 6);
        assert_eq!(config.retention.directory_threshold, 7);
        assert!(!config.retention.protect_root);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str(
            r#"
            [pipeline]
            workers = 2

            [repair]
            vega_put_rule = "legacy"

            [retention]
            dry_run = true
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.workers, 2);
        assert_eq!(config.pipeline.progress_every, 100);
        assert_eq!(config.repair.vega_put_rule, VegaPutRule::Legacy);
        assert_eq!(config.repair.delete_limit, 6);
        assert!(config.retention.dry_run);
    }

    #[test]
    fn test_rejects_zero_workers() {
        let result = Config::from_toml_str("[pipeline]\nworkers = 0\n");
        assert!(matches!(result, Err(ChainError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_bad_window() {
        let mut config = Config::default();
        config.repair.strike_window = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::from_toml_str("[pipeline\nworkers = 2");
        assert!(matches!(result, Err(ChainError::TomlError(_))));
    }
}
