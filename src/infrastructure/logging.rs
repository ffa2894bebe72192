//! Logging system configuration and initialization
//!
//! - Console output and/or a non-blocking file writer
//! - Optional JSON formatted file output
//! - `RUST_LOG` overrides the configured level
//! - Timestamps in a fixed UTC offset (KST by default)

use anyhow::{Result, anyhow};
use chrono::{FixedOffset, Offset, Utc};
use lazy_static::lazy_static;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    filter::Directive,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the file writer flushing until process exit
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> =
        Mutex::new(Vec::new());
}

/// Timestamp formatter for a fixed UTC offset
#[derive(Debug, Clone, Copy)]
pub struct FixedOffsetTimer {
    offset: FixedOffset,
}

impl FixedOffsetTimer {
    /// Falls back to UTC for out-of-range offsets
    #[must_use]
    pub fn from_hours(hours: i32) -> Self {
        let offset = FixedOffset::east_opt(hours.saturating_mul(3600))
            .unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    #[must_use]
    pub fn render_now(&self) -> String {
        Utc::now()
            .with_timezone(&self.offset)
            .format("%Y-%m-%d %H:%M:%S%.3f %:z")
            .to_string()
    }
}

impl FormatTime for FixedOffsetTimer {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", self.render_now())
    }
}

/// Get the log directory relative to the executable location
#[must_use]
pub fn get_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(std::path::Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(&config.level);
        // selector engine internals are noisy below trace
        if !config.level.to_lowercase().contains("trace") {
            for directive in ["html5ever=warn", "selectors=warn", "tokio=info", "runtime=warn"] {
                if let Ok(directive) = directive.parse::<Directive>() {
                    filter = filter.add_directive(directive);
                }
            }
        }
        filter
    })
}

/// Initialize logging with custom configuration
///
/// Fails when neither console nor file output is enabled, or when a global
/// subscriber is already installed.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let registry = Registry::default().with(build_filter(config));
    let timer = FixedOffsetTimer::from_hours(config.utc_offset_hours);

    let log_dir = config.directory.clone().unwrap_or_else(get_log_directory);

    let file_writer = if config.file_output {
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;
        let file_appender = rolling::never(&log_dir, &config.file_name);
        let (writer, guard) = non_blocking(file_appender);
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry poisoned"))?
            .push(guard);
        Some(writer)
    } else {
        None
    };

    // Each arm builds its own console layer: the layer type depends on what it is stacked on
    let init_result = match (file_writer, config.json_format) {
        (Some(writer), true) => {
            let file_layer = fmt::Layer::new()
                .json()
                .with_writer(writer)
                .with_timer(timer)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false);
            let console_layer = config.console_output.then(|| {
                fmt::Layer::new()
                    .with_writer(std::io::stderr)
                    .with_timer(timer)
                    .with_target(false)
            });
            registry.with(file_layer).with(console_layer).try_init()
        }
        (Some(writer), false) => {
            // time + level + message only
            let file_layer = fmt::Layer::new()
                .with_writer(writer)
                .with_timer(timer)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(false);
            let console_layer = config.console_output.then(|| {
                fmt::Layer::new()
                    .with_writer(std::io::stderr)
                    .with_timer(timer)
                    .with_target(false)
            });
            registry.with(file_layer).with(console_layer).try_init()
        }
        (None, _) if config.console_output => {
            let console_layer = fmt::Layer::new()
                .with_writer(std::io::stderr)
                .with_timer(timer)
                .with_target(false);
            registry.with(console_layer).try_init()
        }
        (None, _) => return Err(anyhow!("No logging output configured")),
    };
    init_result.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_output {
        info!("Log file: {:?}", log_dir.join(&config.file_name));
        info!("JSON format: {}", config.json_format);
    }

    Ok(())
}
