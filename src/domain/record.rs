//! Collected record types
//!
//! Every record carries the full, fixed field set. A field nobody could fill
//! holds [`FieldValue::Unknown`], which exports as the `"unknown"` sentinel, so
//! downstream consumers never have to tell null from empty string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::constants::record::UNKNOWN;
use super::fingerprint::Fingerprint;

/// Output fields in export order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    ItemId,
    Title,
    Price,
    Link,
    ImageUrl,
    ShopName,
    SoldText,
    MonthlySales,
    TotalSales,
    ReviewCount,
    Rating,
    ListedAt,
}

impl RecordField {
    pub const ALL: [Self; 12] = [
        Self::ItemId,
        Self::Title,
        Self::Price,
        Self::Link,
        Self::ImageUrl,
        Self::ShopName,
        Self::SoldText,
        Self::MonthlySales,
        Self::TotalSales,
        Self::ReviewCount,
        Self::Rating,
        Self::ListedAt,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ItemId => "item_id",
            Self::Title => "title",
            Self::Price => "price",
            Self::Link => "link",
            Self::ImageUrl => "image_url",
            Self::ShopName => "shop_name",
            Self::SoldText => "sold_text",
            Self::MonthlySales => "monthly_sales",
            Self::TotalSales => "total_sales",
            Self::ReviewCount => "review_count",
            Self::Rating => "rating",
            Self::ListedAt => "listed_at",
        }
    }

    /// Fields that only the third-party annotation block provides
    #[must_use]
    pub const fn is_annotation(self) -> bool {
        matches!(
            self,
            Self::MonthlySales
                | Self::TotalSales
                | Self::ReviewCount
                | Self::Rating
                | Self::ListedAt
        )
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field value or the explicit "unknown" sentinel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldValue {
    Known(String),
    #[default]
    Unknown,
}

impl FieldValue {
    /// Wraps a trimmed value; blank input becomes `Unknown`
    pub fn from_text(text: impl AsRef<str>) -> Self {
        let trimmed = text.as_ref().trim();
        if trimmed.is_empty() || trimmed == UNKNOWN {
            Self::Unknown
        } else {
            Self::Known(trimmed.to_string())
        }
    }

    #[must_use]
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    #[must_use]
    pub fn as_known(&self) -> Option<&str> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unknown => None,
        }
    }

    #[must_use]
    pub fn as_export_str(&self) -> &str {
        self.as_known().unwrap_or(UNKNOWN)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::from_text(value)
    }
}

impl From<FieldValue> for String {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Known(value) => value,
            FieldValue::Unknown => UNKNOWN.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_export_str())
    }
}

/// Whether the third-party annotation had arrived when the record was finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    Complete,
    Partial,
}

impl EnrichmentStatus {
    #[must_use]
    pub const fn from_ready(ready: bool) -> Self {
        if ready { Self::Complete } else { Self::Partial }
    }
}

/// Field values extracted from one slot, before identity is assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRecord {
    fields: BTreeMap<RecordField, FieldValue>,
}

impl Default for DraftRecord {
    fn default() -> Self {
        Self {
            fields: RecordField::ALL
                .iter()
                .map(|field| (*field, FieldValue::Unknown))
                .collect(),
        }
    }
}

impl DraftRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: RecordField, value: FieldValue) {
        self.fields.insert(field, value);
    }

    #[must_use]
    pub fn with(mut self, field: RecordField, value: impl AsRef<str>) -> Self {
        self.set(field, FieldValue::from_text(value));
        self
    }

    #[must_use]
    pub fn get(&self, field: RecordField) -> &FieldValue {
        self.fields.get(&field).unwrap_or(&FieldValue::Unknown)
    }

    #[must_use]
    pub fn known(&self, field: RecordField) -> Option<&str> {
        self.get(field).as_known()
    }

    #[must_use]
    pub fn known_count(&self) -> usize {
        self.fields.values().filter(|value| value.is_known()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordField, &FieldValue)> {
        self.fields.iter().map(|(field, value)| (*field, value))
    }
}

/// One logical item as handed to the snapshot consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedRecord {
    pub fingerprint: Fingerprint,
    #[serde(flatten)]
    pub fields: BTreeMap<RecordField, FieldValue>,
    pub enrichment_status: EnrichmentStatus,
    pub collected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CollectedRecord {
    #[must_use]
    pub fn from_draft(
        fingerprint: Fingerprint,
        draft: DraftRecord,
        enrichment_status: EnrichmentStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            fingerprint,
            fields: draft.fields,
            enrichment_status,
            collected_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn get(&self, field: RecordField) -> &FieldValue {
        self.fields.get(&field).unwrap_or(&FieldValue::Unknown)
    }

    #[must_use]
    pub fn known_count(&self) -> usize {
        self.fields.values().filter(|value| value.is_known()).count()
    }

    /// Folds a re-observation of the same item into this record.
    ///
    /// Known incoming values replace stored ones, `Unknown` never overwrites a
    /// known value, and a complete enrichment status is never downgraded.
    /// Returns the number of fields whose value changed.
    pub fn merge_from(&mut self, incoming: Self) -> usize {
        let mut changed = 0;
        for (field, value) in incoming.fields {
            if !value.is_known() {
                continue;
            }
            let slot = self.fields.entry(field).or_default();
            if *slot != value {
                *slot = value;
                changed += 1;
            }
        }

        let status_upgraded = self.enrichment_status == EnrichmentStatus::Partial
            && incoming.enrichment_status == EnrichmentStatus::Complete;
        if status_upgraded {
            self.enrichment_status = EnrichmentStatus::Complete;
        }

        if changed > 0 || status_upgraded {
            self.updated_at = incoming.updated_at.max(self.updated_at);
        }
        changed
    }

    /// Flat `field -> value` view in export order, metadata last
    #[must_use]
    pub fn to_flat_map(&self) -> Vec<(&'static str, String)> {
        let mut flat: Vec<(&'static str, String)> = RecordField::ALL
            .iter()
            .map(|field| (field.as_str(), self.get(*field).as_export_str().to_string()))
            .collect();
        flat.push(("fingerprint", self.fingerprint.to_string()));
        flat.push((
            "enrichment_status",
            match self.enrichment_status {
                EnrichmentStatus::Complete => "complete".to_string(),
                EnrichmentStatus::Partial => "partial".to_string(),
            },
        ));
        flat.push(("collected_at", self.collected_at.to_rfc3339()));
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(draft: DraftRecord, status: EnrichmentStatus) -> CollectedRecord {
        CollectedRecord::from_draft(Fingerprint::link_id("12345"), draft, status, Utc::now())
    }

    #[test]
    fn blank_text_is_unknown() {
        assert_eq!(FieldValue::from_text("   "), FieldValue::Unknown);
        assert_eq!(FieldValue::from_text("unknown"), FieldValue::Unknown);
        assert_eq!(FieldValue::from_text(" 9.90 "), FieldValue::Known("9.90".into()));
    }

    #[test]
    fn draft_starts_with_every_field_unknown() {
        let draft = DraftRecord::new();
        assert_eq!(draft.iter().count(), RecordField::ALL.len());
        assert_eq!(draft.known_count(), 0);
    }

    #[test]
    fn merge_keeps_known_values_over_unknown() {
        let mut stored = record(
            DraftRecord::new()
                .with(RecordField::Title, "Desk lamp")
                .with(RecordField::Price, "12.00"),
            EnrichmentStatus::Partial,
        );
        let incoming = record(
            DraftRecord::new().with(RecordField::Price, "11.50"),
            EnrichmentStatus::Partial,
        );

        let changed = stored.merge_from(incoming);

        assert_eq!(changed, 1);
        assert_eq!(stored.get(RecordField::Title).as_known(), Some("Desk lamp"));
        assert_eq!(stored.get(RecordField::Price).as_known(), Some("11.50"));
    }

    #[test]
    fn merge_never_downgrades_enrichment() {
        let mut stored = record(DraftRecord::new(), EnrichmentStatus::Complete);
        stored.merge_from(record(DraftRecord::new(), EnrichmentStatus::Partial));
        assert_eq!(stored.enrichment_status, EnrichmentStatus::Complete);
    }

    #[test]
    fn serializes_flat_with_sentinel() {
        let rec = record(
            DraftRecord::new().with(RecordField::Title, "Mug"),
            EnrichmentStatus::Partial,
        );
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["title"], "Mug");
        assert_eq!(json["price"], "unknown");
        assert_eq!(json["enrichment_status"], "partial");
        assert_eq!(json["fingerprint"], "id:12345");
    }

    #[test]
    fn flat_map_follows_export_order() {
        let rec = record(DraftRecord::new(), EnrichmentStatus::Complete);
        let keys: Vec<_> = rec.to_flat_map().into_iter().map(|(key, _)| key).collect();
        assert_eq!(keys[0], "item_id");
        assert_eq!(keys[11], "listed_at");
        assert_eq!(keys[12], "fingerprint");
    }
}
