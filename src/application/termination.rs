//! Termination policy
//!
//! Consulted after every evaluation. Rules in priority order:
//! target reached, stalled without growth, scroll ceiling, then a forced
//! bottom jump once the driver has sat at the bottom for a few stalled
//! evaluations.

use crate::domain::{ScrollState, StopReason};
use crate::infrastructure::config::CollectorConfig;

/// Decision handed back to the scroll driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Force,
    Stop(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationPolicy {
    pub target_count: usize,
    pub stall_threshold: u32,
    pub force_after_stalls: u32,
    pub max_scroll_attempts: u32,
    pub bottom_tolerance_px: u64,
}

impl TerminationPolicy {
    #[must_use]
    pub fn from_config(config: &CollectorConfig) -> Self {
        Self {
            target_count: config.target_count,
            stall_threshold: config.stall_threshold,
            force_after_stalls: config.force_after_stalls,
            max_scroll_attempts: config.max_scroll_attempts,
            bottom_tolerance_px: u64::from(config.bottom_tolerance_px),
        }
    }

    #[must_use]
    pub fn evaluate(&self, collected: usize, scroll: &ScrollState, document_grew: bool) -> Verdict {
        if collected >= self.target_count {
            return Verdict::Stop(StopReason::TargetReached);
        }
        if scroll.stalled_evaluations > self.stall_threshold && !document_grew {
            return Verdict::Stop(StopReason::Stalled);
        }
        if let Some(reason) = self.ceiling_reached(scroll) {
            return Verdict::Stop(reason);
        }
        let at_bottom = scroll.geometry().is_near_bottom(self.bottom_tolerance_px);
        if at_bottom
            && self.force_after_stalls > 0
            && scroll.stalled_evaluations >= self.force_after_stalls
        {
            return Verdict::Force;
        }
        Verdict::Continue
    }

    /// Checked before every scroll action
    #[must_use]
    pub const fn ceiling_reached(&self, scroll: &ScrollState) -> Option<StopReason> {
        if scroll.scroll_attempts >= self.max_scroll_attempts {
            Some(StopReason::ScrollCeiling)
        } else {
            None
        }
    }
}
