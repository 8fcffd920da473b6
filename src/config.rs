//! Configuration management
//!
//! One TOML file drives the whole pipeline. Every section has defaults, so a
//! config only needs to name what differs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::imaging::PlotKind;
use crate::indicators::Indicator;
use crate::modelling::AutoMlConfig;
use crate::sampling::SeedStrategy;
use crate::storage::{FailurePolicy, UploadPolicy};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub indicator: Indicator,
    pub sampling: SamplingConfig,
    pub rendering: RenderingConfig,
    pub dataset: DatasetConfig,
    /// Object store; nothing is uploaded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,
    pub automl: AutoMlConfig,
}

/// Price input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV with one row per firm and timestamp
    pub input: PathBuf,
    pub firm_column: String,
    pub time_column: String,
    pub close_column: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/prices.csv"),
            firm_column: "firm".to_string(),
            time_column: "time".to_string(),
            close_column: "close".to_string(),
        }
    }
}

/// How seeds are handed to each firm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedMode {
    #[default]
    Shared,
    PerGroup,
    Entropy,
}

/// Window sampling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Integer buy-signal column written after the indicator step
    pub signal_column: String,
    /// Bool column marking sampled rows
    pub flag_column: String,
    pub samples_per_group: usize,
    pub seed: u64,
    pub seed_mode: SeedMode,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            signal_column: "buy_signal".to_string(),
            flag_column: "sampled".to_string(),
            samples_per_group: 5,
            seed: 42,
            seed_mode: SeedMode::Shared,
        }
    }
}

impl SamplingConfig {
    pub fn strategy(&self) -> SeedStrategy {
        match self.seed_mode {
            SeedMode::Shared => SeedStrategy::Shared(self.seed),
            SeedMode::PerGroup => SeedStrategy::PerGroup(self.seed),
            SeedMode::Entropy => SeedStrategy::Entropy,
        }
    }
}

/// Chart rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingConfig {
    pub window_size: usize,
    /// Column drawn by line charts
    pub plot_var: String,
    pub kinds: Vec<PlotKind>,
    pub width: u32,
    pub height: u32,
    /// Images land in `<image_dir>/<signal>`
    pub image_dir: PathBuf,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            plot_var: "close".to_string(),
            kinds: vec![PlotKind::Line],
            width: 32,
            height: 32,
            image_dir: PathBuf::from("images"),
        }
    }
}

/// Dataset output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub output_dir: PathBuf,
    /// Remove rendered images once their dataset is written
    pub clear_images: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("datasets"),
            clear_images: true,
        }
    }
}

/// Object store target and retry policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the filesystem store
    pub root: PathBuf,
    pub bucket: String,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub on_failure: FailurePolicy,
    /// Remove local dataset files after a confirmed upload
    pub delete_after_upload: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("bucket_store"),
            bucket: "chart-datasets".to_string(),
            max_attempts: 3,
            retry_delay_ms: 500,
            on_failure: FailurePolicy::Abort,
            delete_after_upload: false,
        }
    }
}

impl StorageConfig {
    pub fn policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            on_failure: self.on_failure,
        }
    }
}

impl PipelineConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidParameter(msg.to_string()));

        if self.rendering.window_size == 0 {
            return invalid("rendering.window_size must be > 0");
        }
        if self.rendering.width == 0 || self.rendering.height == 0 {
            return invalid("rendering.width and rendering.height must be > 0");
        }
        if self.rendering.kinds.is_empty() {
            return invalid("rendering.kinds must name at least one plot kind");
        }
        if self.sampling.samples_per_group == 0 {
            return invalid("sampling.samples_per_group must be > 0");
        }
        if let Some(storage) = &self.storage {
            if storage.max_attempts == 0 {
                return invalid("storage.max_attempts must be > 0");
            }
            if storage.bucket.is_empty() {
                return invalid("storage.bucket must not be empty");
            }
        }
        match self.indicator {
            Indicator::Rsi { period: 0 } | Indicator::BollingerBands { period: 0, .. } => {
                return invalid("indicator.period must be > 0")
            }
            Indicator::Macd { fast, slow, signal } if fast == 0 || slow == 0 || signal == 0 => {
                return invalid("indicator periods must be > 0")
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.rendering.window_size, 20);
        assert_eq!(config.automl.max_models, 100);
        assert!(config.storage.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [indicator]
            kind = "macd"
            fast = 12
            slow = 26
            signal = 9

            [sampling]
            samples_per_group = 2
            seed_mode = "per_group"

            [rendering]
            kinds = ["line", "candle"]

            [storage]
            bucket = "charts"
            on_failure = "log_and_continue"
            "#,
        )
        .unwrap();

        assert_eq!(config.indicator.name(), "macd");
        assert_eq!(config.sampling.strategy(), SeedStrategy::PerGroup(42));
        assert_eq!(config.rendering.kinds, vec![PlotKind::Line, PlotKind::Candle]);
        let storage = config.storage.unwrap();
        assert_eq!(storage.policy().on_failure, FailurePolicy::LogAndContinue);
        assert_eq!(storage.max_attempts, 3);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.toml");
        let mut config = PipelineConfig::default();
        config.storage = Some(StorageConfig::default());
        config.sampling.seed_mode = SeedMode::Entropy;

        config.save_toml(&path).unwrap();
        let loaded = PipelineConfig::from_toml(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = PipelineConfig::default();
        config.rendering.window_size = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.sampling.samples_per_group = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.storage = Some(StorageConfig {
            max_attempts: 0,
            ..StorageConfig::default()
        });
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.indicator = Indicator::Rsi { period: 0 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_toml() {
        let err = PipelineConfig::from_toml_str("[rendering]\nwindow_size = \"wide\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
