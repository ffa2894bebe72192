//! Domain layer
//!
//! Value types shared by every component of the collection engine: slot
//! handles, identities, records and the scroll/termination vocabulary.

pub mod constants;
pub mod fingerprint;
pub mod record;
pub mod scroll;
pub mod slot;

pub use fingerprint::{Fingerprint, FingerprintGenerator, parse_link_id};
pub use record::{CollectedRecord, DraftRecord, EnrichmentStatus, FieldValue, RecordField};
pub use scroll::{DriverState, PageGeometry, RunOutcome, ScrollState, StopReason};
pub use slot::{ContentHash, SlotContent, SlotHandle};
