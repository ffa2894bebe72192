//! Listing Harvester
//!
//! Incremental collection of unique records from virtualized product lists.
//! A fixed pool of recycled slots is scrolled through, each changed slot is
//! given time to receive its third-party annotation, and every card is
//! extracted, fingerprinted and merged into an insertion-ordered store until
//! the target is reached or the page runs dry.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{CollectionProgress, ListCollector, RunReport, RunStats};
pub use domain::{CollectedRecord, DriverState, Fingerprint, RecordField, RunOutcome, StopReason};
pub use infrastructure::{AppConfig, CollectorConfig, FieldExtractor, PageDriver};
