//! Application layer
//!
//! The collection pipeline: change detection, enrichment waiting, the
//! collection store, the termination policy and the scroll driver that runs
//! them as one cooperative loop.

pub mod change_detector;
pub mod collection_store;
pub mod enrichment_waiter;
pub mod events;
pub mod list_collector;
pub mod termination;

pub use change_detector::ChangeDetector;
pub use collection_store::{CollectionStore, UpsertOutcome};
pub use enrichment_waiter::{EnrichmentWait, EnrichmentWaiter};
pub use events::{CollectionProgress, ProgressPublisher};
pub use list_collector::{ListCollector, RunReport, RunStats};
pub use termination::{TerminationPolicy, Verdict};
