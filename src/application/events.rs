//! Progress events for UI panels
//!
//! The collector publishes a [`CollectionProgress`] after every transition
//! through a `tokio::sync::watch` channel; late subscribers only ever see the
//! latest value.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::{DriverState, StopReason};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionProgress {
    pub run_id: Uuid,
    pub state: DriverState,
    pub collected: usize,
    pub target: usize,
    pub scroll_attempts: u32,
    pub stalled_evaluations: u32,
    pub forced_jumps: u32,
    pub stop_reason: Option<StopReason>,
}

impl CollectionProgress {
    #[must_use]
    pub const fn idle(run_id: Uuid, target: usize) -> Self {
        Self {
            run_id,
            state: DriverState::Idle,
            collected: 0,
            target,
            scroll_attempts: 0,
            stalled_evaluations: 0,
            forced_jumps: 0,
            stop_reason: None,
        }
    }

    /// Collected share of the target, capped at 100
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.target == 0 {
            return 100.0;
        }
        ((self.collected as f64 / self.target as f64) * 100.0).min(100.0)
    }
}

/// Sending half owned by the collector
#[derive(Debug)]
pub struct ProgressPublisher {
    sender: watch::Sender<CollectionProgress>,
}

impl ProgressPublisher {
    #[must_use]
    pub fn new(initial: CollectionProgress) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Publishes even when nobody is subscribed
    pub fn publish(&self, progress: CollectionProgress) {
        self.sender.send_replace(progress);
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CollectionProgress> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn latest(&self) -> CollectionProgress {
        self.sender.borrow().clone()
    }
}
