//! Collection store
//!
//! One record per fingerprint, kept in first-insertion order. Only the
//! collector's main loop mutates it; consumers get cloned snapshots.

use std::collections::HashMap;

use crate::domain::{CollectedRecord, EnrichmentStatus, Fingerprint};

/// What an upsert did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First observation of the fingerprint
    Inserted,
    /// Existing record gained or replaced fields, or its enrichment completed
    Merged { changed_fields: usize },
    /// Re-observation carried nothing new
    Unchanged,
}

impl UpsertOutcome {
    #[must_use]
    pub const fn is_new(self) -> bool {
        matches!(self, Self::Inserted)
    }
}

#[derive(Debug, Default)]
pub struct CollectionStore {
    records: Vec<CollectedRecord>,
    index: HashMap<Fingerprint, usize>,
}

impl CollectionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `record` under `fingerprint`, or merges it into the record
    /// already stored there. Known values win over `unknown`, and a complete
    /// enrichment status is never downgraded.
    pub fn upsert(
        &mut self,
        fingerprint: Fingerprint,
        mut record: CollectedRecord,
    ) -> UpsertOutcome {
        record.fingerprint = fingerprint;
        if let Some(&position) = self.index.get(&record.fingerprint) {
            let existing = &mut self.records[position];
            let was_partial = existing.enrichment_status == EnrichmentStatus::Partial;
            let changed_fields = existing.merge_from(record);
            let completed = was_partial && existing.enrichment_status == EnrichmentStatus::Complete;
            if changed_fields > 0 || completed {
                UpsertOutcome::Merged { changed_fields }
            } else {
                UpsertOutcome::Unchanged
            }
        } else {
            self.index.insert(record.fingerprint.clone(), self.records.len());
            self.records.push(record);
            UpsertOutcome::Inserted
        }
    }

    /// Number of distinct fingerprints
    #[must_use]
    pub fn size(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.index.contains_key(fingerprint)
    }

    #[must_use]
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&CollectedRecord> {
        self.index.get(fingerprint).map(|&position| &self.records[position])
    }

    /// Records in first-insertion order
    #[must_use]
    pub fn snapshot(&self) -> Vec<CollectedRecord> {
        self.records.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectedRecord> {
        self.records.iter()
    }
}
