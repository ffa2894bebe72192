//! Rendering slots of a virtualized list
//!
//! A slot is one of the few DOM positions the host page recycles while the
//! user scrolls. Its handle is a position in that fixed window, never an item
//! identity: durable keying always goes through [`Fingerprint`](super::Fingerprint).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a rendering slot inside the page's fixed slot pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotHandle(u32);

impl SlotHandle {
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SlotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// Markup currently rendered in one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotContent {
    pub handle: SlotHandle,
    pub html: String,
}

impl SlotContent {
    pub fn new(handle: SlotHandle, html: impl Into<String>) -> Self {
        Self {
            handle,
            html: html.into(),
        }
    }
}

/// Digest of a slot's volatile visible fields
///
/// Only answers "did this slot show something else since last time".
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hashes link target, image reference, title text and price text in that order.
    /// Missing parts hash as empty so that a slot showing nothing stays stable.
    #[must_use]
    pub fn from_visible_fields(
        link: Option<&str>,
        image: Option<&str>,
        title: Option<&str>,
        price: Option<&str>,
    ) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in [link, image, title, price] {
            let part = part.unwrap_or_default();
            // length prefix keeps ("ab", "c") and ("a", "bc") apart
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(*hasher.finalize().as_bytes())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash(")?;
        for byte in &self.0[..6] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}
