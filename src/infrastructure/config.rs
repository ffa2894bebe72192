//! Configuration infrastructure
//!
//! Configuration is layered, lowest priority first:
//! 1. Built-in defaults (`domain::constants`)
//! 2. Optional config file (JSON or TOML, picked by extension)
//! 3. Environment variables prefixed `HARVESTER__`, nested with `__`
//!    (e.g. `HARVESTER__COLLECTOR__TARGET_COUNT=250`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::domain::constants::{collector as defaults, logging as log_defaults};
use crate::infrastructure::parsing::ExtractionConfig;

const APP_DIR_NAME: &str = "listing-harvester";
const CONFIG_FILE_NAME: &str = "listing_harvester.toml";
const ENV_PREFIX: &str = "HARVESTER";
const ENV_SEPARATOR: &str = "__";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Configuration file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("No user configuration directory on this platform")]
    NoConfigDir,
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub collector: CollectorConfig,
    pub extraction: ExtractionConfig,
    pub logging: LoggingConfig,
}

/// Run configuration of one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Desired number of unique items
    pub target_count: usize,

    /// Ceiling on scroll actions, forced jumps included
    pub max_scroll_attempts: u32,

    /// Stalled evaluations (no new item, no growth) that end the run
    pub stall_threshold: u32,

    /// Stalled evaluations at the bottom before a forced jump
    pub force_after_stalls: u32,

    pub enrichment_timeout_ms: u64,
    pub enrichment_poll_interval_ms: u64,
    pub settle_interval_ms: u64,

    /// Scroll step as a fraction of the viewport height
    pub scroll_step_ratio: f64,

    /// Upper bound of the random extra pixels per step
    pub scroll_jitter_px: u32,

    pub bottom_tolerance_px: u32,
    pub max_consecutive_page_errors: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            target_count: defaults::DEFAULT_TARGET_COUNT,
            max_scroll_attempts: defaults::DEFAULT_MAX_SCROLL_ATTEMPTS,
            stall_threshold: defaults::DEFAULT_STALL_THRESHOLD,
            force_after_stalls: defaults::DEFAULT_FORCE_AFTER_STALLS,
            enrichment_timeout_ms: defaults::DEFAULT_ENRICHMENT_TIMEOUT_MS,
            enrichment_poll_interval_ms: defaults::DEFAULT_ENRICHMENT_POLL_INTERVAL_MS,
            settle_interval_ms: defaults::DEFAULT_SETTLE_INTERVAL_MS,
            scroll_step_ratio: defaults::DEFAULT_SCROLL_STEP_RATIO,
            scroll_jitter_px: defaults::DEFAULT_SCROLL_JITTER_PX,
            bottom_tolerance_px: defaults::DEFAULT_BOTTOM_TOLERANCE_PX,
            max_consecutive_page_errors: defaults::DEFAULT_MAX_CONSECUTIVE_PAGE_ERRORS,
        }
    }
}

impl CollectorConfig {
    #[must_use]
    pub fn enrichment_timeout(&self) -> Duration {
        Duration::from_millis(self.enrichment_timeout_ms)
    }

    #[must_use]
    pub fn enrichment_poll_interval(&self) -> Duration {
        Duration::from_millis(self.enrichment_poll_interval_ms)
    }

    #[must_use]
    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }

    /// Scroll distance of one step for the given viewport height, before jitter
    #[must_use]
    pub fn scroll_step(&self, viewport_height: u64) -> u64 {
        ((viewport_height as f64) * self.scroll_step_ratio).round().max(1.0) as u64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_count == 0 {
            return Err(ConfigError::invalid("target_count", "must be at least 1"));
        }
        if self.max_scroll_attempts == 0 {
            return Err(ConfigError::invalid("max_scroll_attempts", "must be at least 1"));
        }
        if !self.scroll_step_ratio.is_finite() || self.scroll_step_ratio <= 0.0 {
            return Err(ConfigError::invalid(
                "scroll_step_ratio",
                format!("must be a positive number, got {}", self.scroll_step_ratio),
            ));
        }
        if self.enrichment_poll_interval_ms == 0 {
            return Err(ConfigError::invalid("enrichment_poll_interval_ms", "must be at least 1"));
        }
        if self.enrichment_poll_interval_ms > self.enrichment_timeout_ms {
            return Err(ConfigError::invalid(
                "enrichment_poll_interval_ms",
                format!(
                    "{}ms exceeds enrichment_timeout_ms ({}ms)",
                    self.enrichment_poll_interval_ms, self.enrichment_timeout_ms
                ),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// JSON formatted file output
    pub json_format: bool,

    pub console_output: bool,
    pub file_output: bool,
    pub file_name: String,

    /// Log directory; next to the executable when unset
    pub directory: Option<PathBuf>,

    /// Offset of the timestamps written by the log formatter
    pub utc_offset_hours: i32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: log_defaults::LOG_LEVEL.to_string(),
            json_format: log_defaults::LOG_JSON_FORMAT,
            console_output: log_defaults::LOG_CONSOLE_OUTPUT,
            file_output: log_defaults::LOG_FILE_OUTPUT,
            file_name: log_defaults::LOG_FILE_NAME.to_string(),
            directory: None,
            utc_offset_hours: log_defaults::LOG_UTC_OFFSET_HOURS,
        }
    }
}

pub struct ConfigManager {
    pub config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
        Ok(dirs::config_dir().ok_or(ConfigError::NoConfigDir)?.join(APP_DIR_NAME))
    }

    /// Manager reading the per-user config file when one exists
    #[must_use]
    pub fn new() -> Self {
        let config_path = Self::get_config_dir()
            .ok()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .filter(|path| path.exists());
        Self { config_path }
    }

    /// Manager reading an explicit file, which must exist
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Builds the layered configuration and validates the collector section
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let defaults = serde_json::to_string(&AppConfig::default())?;

        let mut builder = ::config::Config::builder()
            .add_source(::config::File::from_str(&defaults, ::config::FileFormat::Json));

        if let Some(path) = &self.config_path {
            debug!("Layering configuration file: {:?}", path);
            builder = builder.add_source(::config::File::from(path.as_path()).required(true));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.collector.validate()?;

        info!(
            "Configuration loaded (file: {:?}, target_count: {})",
            self.config_path, config.collector.target_count
        );
        Ok(config)
    }

    /// Writes `config` as pretty JSON, creating parent directories
    pub async fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content).await?;
        info!("Configuration saved to: {:?}", path);
        Ok(())
    }

    #[must_use]
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
