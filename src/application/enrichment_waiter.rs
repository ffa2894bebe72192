//! Enrichment waiter
//!
//! Polls one slot at a fixed interval until the third-party annotation
//! marker shows up or the caller's budget runs out. Never retries past the
//! budget; the caller decides what a timeout means.

use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::domain::{SlotContent, SlotHandle};
use crate::infrastructure::page::PageDriver;
use crate::infrastructure::parsing::FieldExtractor;

/// Result of one wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentWait {
    pub ready: bool,
    /// Last successful read of the slot
    pub content: Option<SlotContent>,
    pub waited: Duration,
    /// Failed slot reads while polling
    pub page_errors: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct EnrichmentWaiter {
    poll_interval: Duration,
}

impl EnrichmentWaiter {
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn await_enrichment<P>(
        &self,
        page: &P,
        extractor: &FieldExtractor,
        handle: SlotHandle,
        timeout: Duration,
    ) -> EnrichmentWait
    where
        P: PageDriver + ?Sized,
    {
        let started = Instant::now();
        let mut content = None;
        let mut page_errors = 0;

        loop {
            match page.slot(handle).await {
                Ok(Some(current)) => {
                    let ready = extractor.has_enrichment(&current);
                    content = Some(current);
                    if ready {
                        debug!(
                            %handle,
                            waited_ms = started.elapsed().as_millis() as u64,
                            "enrichment ready"
                        );
                        return EnrichmentWait {
                            ready: true,
                            content,
                            waited: started.elapsed(),
                            page_errors,
                        };
                    }
                }
                Ok(None) => {
                    debug!(%handle, "slot disappeared while waiting for enrichment");
                    break;
                }
                Err(e) => {
                    page_errors += 1;
                    warn!(%handle, "Slot read failed while waiting for enrichment: {}", e);
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                break;
            }
            sleep(self.poll_interval.min(timeout - elapsed)).await;
        }

        EnrichmentWait {
            ready: false,
            content,
            waited: started.elapsed(),
            page_errors,
        }
    }
}
