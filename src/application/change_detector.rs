//! Content-change detection per slot
//!
//! A performance filter only: it keeps the last content hash seen in every
//! slot so unchanged slots are not waited on and re-extracted each tick.
//! Identity and deduplication never depend on it.

use std::collections::HashMap;

use crate::domain::{ContentHash, SlotHandle};

#[derive(Debug, Default)]
pub struct ChangeDetector {
    last_seen: HashMap<SlotHandle, ContentHash>,
}

impl ChangeDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `current` for `handle` and reports whether it differs from the
    /// previous observation. The first observation of a handle always counts as changed.
    pub fn has_changed(&mut self, handle: SlotHandle, current: ContentHash) -> bool {
        self.last_seen
            .insert(handle, current)
            .is_none_or(|previous| previous != current)
    }

    #[must_use]
    pub fn tracked_slots(&self) -> usize {
        self.last_seen.len()
    }

    pub fn forget(&mut self, handle: SlotHandle) {
        self.last_seen.remove(&handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(title: &str) -> ContentHash {
        ContentHash::from_visible_fields(None, None, Some(title), None)
    }

    #[test]
    fn first_observation_is_a_change() {
        let mut detector = ChangeDetector::new();
        assert!(detector.has_changed(SlotHandle::new(3), hash("Desk lamp")));
        assert_eq!(detector.tracked_slots(), 1);
    }

    #[test]
    fn identical_content_is_not_a_change() {
        let mut detector = ChangeDetector::new();
        let handle = SlotHandle::new(0);
        detector.has_changed(handle, hash("Desk lamp"));
        assert!(!detector.has_changed(handle, hash("Desk lamp")));
    }

    #[test]
    fn recycled_slot_with_new_item_is_a_change() {
        let mut detector = ChangeDetector::new();
        let handle = SlotHandle::new(0);
        detector.has_changed(handle, hash("Desk lamp"));
        assert!(detector.has_changed(handle, hash("Floor lamp")));
        // the new value is now the baseline
        assert!(!detector.has_changed(handle, hash("Floor lamp")));
    }

    #[test]
    fn handles_are_tracked_independently() {
        let mut detector = ChangeDetector::new();
        detector.has_changed(SlotHandle::new(0), hash("Desk lamp"));
        assert!(detector.has_changed(SlotHandle::new(1), hash("Desk lamp")));
        detector.forget(SlotHandle::new(0));
        assert!(detector.has_changed(SlotHandle::new(0), hash("Desk lamp")));
    }
}
