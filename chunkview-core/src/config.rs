//! Chart configuration, loaded from TOML.
//!
//! ```toml
//! [chart]
//! chunk_size = 500
//! scroll_threshold = 0.025
//! shift_fraction = 0.25
//! event_margin = 0.1
//!
//! [strategy]
//! risk_reward_ratio = 2.0
//! stop_loss_atr = 1.5
//! timeframe = "1Day"
//!
//! [settings]
//! test_mode = false
//!
//! [indicators.RSI]
//! period = 14
//! underbought = 30
//! overbought = 70
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Smallest chunk that still leaves room for a dead zone and a brush.
pub const MIN_CHUNK_SIZE: usize = 8;

/// Numeric parameters for one indicator, forwarded verbatim to the series source.
pub type IndicatorParams = BTreeMap<String, f64>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Windowing constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Number of dates materialized at once.
    pub chunk_size: usize,
    /// Fraction of the chunk at each edge that triggers a shift.
    pub scroll_threshold: f64,
    /// Fraction of the chunk the window moves per shift.
    pub shift_fraction: f64,
    /// Brush padding around a selected event, as a fraction of the chunk.
    pub event_margin: f64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            scroll_threshold: 0.025,
            shift_fraction: 0.25,
            event_margin: 0.1,
        }
    }
}

impl ChartConfig {
    /// Lowest viewport start that does not trigger a left shift.
    pub fn min_threshold(&self) -> usize {
        (self.chunk_size as f64 * self.scroll_threshold).floor() as usize
    }

    /// Highest viewport end that does not trigger a right shift.
    pub fn max_threshold(&self) -> usize {
        (self.chunk_size as f64 * (1.0 - self.scroll_threshold)).floor() as usize
    }

    /// How many dates a single shift moves the window.
    pub fn shift_step(&self) -> usize {
        (self.chunk_size as f64 * self.shift_fraction).floor() as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(ConfigError::Invalid(format!(
                "chunk_size must be at least {MIN_CHUNK_SIZE}, got {}",
                self.chunk_size
            )));
        }
        if !(self.scroll_threshold > 0.0 && self.scroll_threshold < 0.5) {
            return Err(ConfigError::Invalid(format!(
                "scroll_threshold must be in (0, 0.5), got {}",
                self.scroll_threshold
            )));
        }
        if !(self.shift_fraction > 0.0 && self.shift_fraction <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "shift_fraction must be in (0, 1], got {}",
                self.shift_fraction
            )));
        }
        if !(self.event_margin >= 0.0 && self.event_margin < 0.5) {
            return Err(ConfigError::Invalid(format!(
                "event_margin must be in [0, 0.5), got {}",
                self.event_margin
            )));
        }
        if self.shift_step() == 0 {
            return Err(ConfigError::Invalid(
                "shift_fraction too small: a shift would move zero dates".into(),
            ));
        }
        Ok(())
    }
}

/// Bar timeframe requested from the series source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[default]
    #[serde(rename = "1Day")]
    OneDay,
    #[serde(rename = "1Hour")]
    OneHour,
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::OneDay => write!(f, "1Day"),
            Timeframe::OneHour => write!(f, "1Hour"),
        }
    }
}

/// Risk settings of the strategy that produced the events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyOptions {
    pub risk_reward_ratio: Option<f64>,
    /// ATR multiple below the low used as the implied stop.
    pub stop_loss_atr: Option<f64>,
    pub timeframe: Timeframe,
}

/// User-facing chart toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartSettings {
    /// Blind review: centering on an event shows only the run-up to the buy.
    pub test_mode: bool,
}

/// Complete configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkviewConfig {
    pub chart: ChartConfig,
    pub strategy: StrategyOptions,
    pub settings: ChartSettings,
    /// Parameters for every indicator the user may activate.
    pub indicators: BTreeMap<String, IndicatorParams>,
}

impl ChunkviewConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chart.validate()?;
        if let Some(ratio) = self.strategy.risk_reward_ratio {
            if !ratio.is_finite() || ratio < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "risk_reward_ratio must be a non-negative number, got {ratio}"
                )));
            }
        }
        if let Some(mult) = self.strategy.stop_loss_atr {
            if !mult.is_finite() || mult < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "stop_loss_atr must be a non-negative number, got {mult}"
                )));
            }
        }
        Ok(())
    }

    /// Parameters for the given indicators; unknown names get an empty set so
    /// the source applies its own defaults.
    pub fn indicator_options(&self, active: &[String]) -> BTreeMap<String, IndicatorParams> {
        active
            .iter()
            .map(|name| {
                let params = self.indicators.get(name).cloned().unwrap_or_default();
                (name.clone(), params)
            })
            .collect()
    }
}
