//! Scroll geometry, driver states and run outcomes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Page geometry as reported by the host page, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageGeometry {
    pub scroll_offset: u64,
    pub viewport_height: u64,
    pub document_height: u64,
}

impl PageGeometry {
    /// Largest offset the page can scroll to
    #[must_use]
    pub const fn max_offset(&self) -> u64 {
        self.document_height.saturating_sub(self.viewport_height)
    }

    #[must_use]
    pub const fn is_near_bottom(&self, tolerance_px: u64) -> bool {
        self.scroll_offset + self.viewport_height + tolerance_px >= self.document_height
    }
}

/// Scroll bookkeeping owned by the collector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollState {
    pub offset: u64,
    pub viewport_height: u64,
    pub document_height: u64,
    /// Consecutive evaluations that produced no new fingerprint and no document growth
    pub stalled_evaluations: u32,
    /// Scroll steps plus forced jumps issued so far
    pub scroll_attempts: u32,
    pub forced_jumps: u32,
}

impl ScrollState {
    /// Records a fresh geometry reading; returns whether the document grew
    pub fn observe(&mut self, geometry: PageGeometry) -> bool {
        let grew = geometry.document_height > self.document_height;
        self.offset = geometry.scroll_offset;
        self.viewport_height = geometry.viewport_height;
        self.document_height = geometry.document_height;
        grew
    }

    #[must_use]
    pub const fn geometry(&self) -> PageGeometry {
        PageGeometry {
            scroll_offset: self.offset,
            viewport_height: self.viewport_height,
            document_height: self.document_height,
        }
    }

    /// Updates the stall counter after an evaluation
    pub fn record_evaluation(&mut self, new_unique: usize, document_grew: bool) {
        if new_unique > 0 || document_grew {
            self.stalled_evaluations = 0;
        } else {
            self.stalled_evaluations += 1;
        }
    }
}

/// States of the scroll driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverState {
    Idle,
    Scrolling,
    Settling,
    Evaluating,
    Forcing,
    Done,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Scrolling => "SCROLLING",
            Self::Settling => "SETTLING",
            Self::Evaluating => "EVALUATING",
            Self::Forcing => "FORCING",
            Self::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Why a run reached `DONE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    TargetReached,
    /// No new items and no page growth for the stall threshold
    Stalled,
    /// Scroll attempt ceiling hit
    ScrollCeiling,
    Cancelled,
    /// Host page kept failing
    PageUnavailable,
}

impl StopReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TargetReached => "target reached",
            Self::Stalled => "stalled",
            Self::ScrollCeiling => "scroll ceiling",
            Self::Cancelled => "cancelled",
            Self::PageUnavailable => "page unavailable",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of a run; never an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub reason: StopReason,
    pub collected: usize,
    pub target: usize,
}

impl RunOutcome {
    /// Fewer items than requested; an expected terminal state, not a failure
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        self.collected < self.target
    }
}
