//! Infrastructure layer
//!
//! The host page seam and its in-memory implementation, card extraction,
//! configuration loading and logging.

pub mod config;
pub mod logging;
pub mod page;
pub mod parsing;
pub mod parsing_error;
pub mod simulated_page;

pub use config::{AppConfig, CollectorConfig, ConfigError, ConfigManager, LoggingConfig};
pub use logging::{init_logging, init_logging_with_config};
pub use page::{PageDriver, PageError, PageResult};
pub use parsing::{ExtractionConfig, ExtractionError, FieldExtractor};
pub use simulated_page::{
    EnrichmentArrival, GrowthMode, MarkupVariant, SimulatedItem, SimulatedListPage,
    SimulatedPageOptions,
};
