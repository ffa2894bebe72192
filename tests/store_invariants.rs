//! Property tests for the collection store merge rules
use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use listing_harvester::application::{CollectionStore, UpsertOutcome};
use listing_harvester::domain::{
    CollectedRecord, DraftRecord, EnrichmentStatus, Fingerprint, RecordField,
};
use proptest::prelude::*;

const FIELDS: [RecordField; 4] = [
    RecordField::Title,
    RecordField::Price,
    RecordField::MonthlySales,
    RecordField::Rating,
];

#[derive(Debug, Clone)]
struct Observation {
    key: u8,
    values: [Option<u8>; 4],
    ready: bool,
}

fn observation() -> impl Strategy<Value = Observation> {
    (0u8..6, proptest::array::uniform4(proptest::option::of(0u8..4)), any::<bool>())
        .prop_map(|(key, values, ready)| Observation { key, values, ready })
}

fn record(observation: &Observation, tick: i64) -> (Fingerprint, CollectedRecord) {
    let fingerprint = Fingerprint::link_id(format!("70{:04}", observation.key));
    let mut draft = DraftRecord::new();
    for (field, value) in FIELDS.iter().zip(observation.values) {
        if let Some(value) = value {
            draft = draft.with(*field, format!("{} v{value}", field.as_str()));
        }
    }
    let now = Utc.timestamp_opt(1_700_000_000 + tick, 0).unwrap();
    let record = CollectedRecord::from_draft(
        fingerprint.clone(),
        draft,
        EnrichmentStatus::from_ready(observation.ready),
        now,
    );
    (fingerprint, record)
}

proptest! {
    #[test]
    fn size_grows_monotonically_and_counts_distinct_keys(
        observations in proptest::collection::vec(observation(), 1..60)
    ) {
        let mut store = CollectionStore::new();
        let mut first_seen = Vec::new();
        let mut previous = 0;

        for (tick, observation) in observations.iter().enumerate() {
            let (fingerprint, record) = record(observation, tick as i64);
            let outcome = store.upsert(fingerprint.clone(), record);

            prop_assert!(store.size() >= previous);
            prop_assert_eq!(outcome.is_new(), !first_seen.contains(&fingerprint));
            if outcome.is_new() {
                first_seen.push(fingerprint);
            }
            previous = store.size();
        }

        prop_assert_eq!(store.size(), first_seen.len());
        let order: Vec<Fingerprint> = store.iter().map(|r| r.fingerprint.clone()).collect();
        prop_assert_eq!(order, first_seen);
    }

    #[test]
    fn merges_never_lose_known_values_or_completeness(
        observations in proptest::collection::vec(observation(), 1..60)
    ) {
        let mut store = CollectionStore::new();
        let mut expected: HashMap<Fingerprint, (HashMap<RecordField, String>, bool)> =
            HashMap::new();

        for (tick, observation) in observations.iter().enumerate() {
            let (fingerprint, record) = record(observation, tick as i64);
            let entry = expected.entry(fingerprint.clone()).or_default();
            for (field, value) in FIELDS.iter().zip(observation.values) {
                if let Some(value) = value {
                    entry.0.insert(*field, format!("{} v{value}", field.as_str()));
                }
            }
            entry.1 |= observation.ready;

            let outcome = store.upsert(fingerprint, record);
            if let UpsertOutcome::Merged { changed_fields } = outcome {
                prop_assert!(changed_fields <= FIELDS.len());
            }
        }

        for (fingerprint, (fields, complete)) in &expected {
            let stored = store.get(fingerprint).expect("every observed key is stored");
            for field in FIELDS {
                prop_assert_eq!(
                    stored.get(field).as_known(),
                    fields.get(&field).map(String::as_str)
                );
            }
            let status =
                if *complete { EnrichmentStatus::Complete } else { EnrichmentStatus::Partial };
            prop_assert_eq!(stored.enrichment_status, status);
        }
    }
}

#[test]
fn identical_observation_is_unchanged() {
    let observation = Observation { key: 1, values: [Some(1), Some(2), None, None], ready: true };
    let mut store = CollectionStore::new();
    let (fingerprint, first) = record(&observation, 0);
    let (_, again) = record(&observation, 1);

    assert_eq!(store.upsert(fingerprint.clone(), first), UpsertOutcome::Inserted);
    assert_eq!(store.upsert(fingerprint.clone(), again), UpsertOutcome::Unchanged);
    let stored = store.get(&fingerprint).unwrap();
    assert_eq!(stored.updated_at, stored.collected_at);
}
