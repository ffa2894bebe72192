//! Scroll driver and main collection loop
//!
//! `ListCollector` owns every piece of mutable run state: the store, the
//! change detector, scroll counters and statistics. It advances one state
//! transition per [`ListCollector::step`]:
//!
//! ```text
//! IDLE -> SETTLING -> EVALUATING -> SCROLLING -> SETTLING -> ...
//!                         |-> FORCING -> SCROLLING
//!                         '-> DONE
//! ```
//!
//! The loop suspends only in the settle wait and the enrichment poll. A slot
//! is upserted only after its enrichment wait resolved, so extraction never
//! races the third-party annotation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::change_detector::ChangeDetector;
use super::collection_store::{CollectionStore, UpsertOutcome};
use super::enrichment_waiter::EnrichmentWaiter;
use super::events::{CollectionProgress, ProgressPublisher};
use super::termination::{TerminationPolicy, Verdict};
use crate::domain::{
    CollectedRecord, DriverState, EnrichmentStatus, FingerprintGenerator, RunOutcome, ScrollState,
    SlotContent, StopReason,
};
use crate::infrastructure::config::{CollectorConfig, ConfigError};
use crate::infrastructure::page::{PageDriver, PageError};
use crate::infrastructure::parsing::FieldExtractor;

/// Counters of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub evaluations: u32,
    pub slots_processed: u32,
    pub slots_unchanged: u32,
    pub enrichment_timeouts: u32,
    pub scroll_attempts: u32,
    pub forced_jumps: u32,
    pub load_more_activations: u32,
    pub page_errors: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Everything a finished run hands to the snapshot consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    pub records: Vec<CollectedRecord>,
    pub stats: RunStats,
}

pub struct ListCollector<P: PageDriver> {
    run_id: Uuid,
    page: P,
    config: CollectorConfig,
    extractor: FieldExtractor,
    fingerprints: FingerprintGenerator,
    detector: ChangeDetector,
    waiter: EnrichmentWaiter,
    store: CollectionStore,
    policy: TerminationPolicy,
    scroll: ScrollState,
    state: DriverState,
    outcome: Option<RunOutcome>,
    stats: RunStats,
    consecutive_page_errors: u32,
    cancel: CancellationToken,
    progress: ProgressPublisher,
    rng: fastrand::Rng,
}

impl<P: PageDriver> ListCollector<P> {
    pub fn new(
        page: P,
        config: CollectorConfig,
        extractor: FieldExtractor,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let run_id = Uuid::new_v4();
        Ok(Self {
            run_id,
            page,
            waiter: EnrichmentWaiter::new(config.enrichment_poll_interval()),
            policy: TerminationPolicy::from_config(&config),
            progress: ProgressPublisher::new(CollectionProgress::idle(run_id, config.target_count)),
            config,
            extractor,
            fingerprints: FingerprintGenerator::new(),
            detector: ChangeDetector::new(),
            store: CollectionStore::new(),
            scroll: ScrollState::default(),
            state: DriverState::Idle,
            outcome: None,
            stats: RunStats::default(),
            consecutive_page_errors: 0,
            cancel: CancellationToken::new(),
            rng: fastrand::Rng::new(),
        })
    }

    /// Seeds the scroll jitter so runs are reproducible
    #[must_use]
    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    /// Uses an externally owned token, e.g. a child of an application-wide shutdown token
    #[must_use]
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    #[must_use]
    pub const fn state(&self) -> DriverState {
        self.state
    }

    #[must_use]
    pub const fn outcome(&self) -> Option<RunOutcome> {
        self.outcome
    }

    #[must_use]
    pub const fn stats(&self) -> &RunStats {
        &self.stats
    }

    #[must_use]
    pub const fn scroll_state(&self) -> &ScrollState {
        &self.scroll
    }

    #[must_use]
    pub const fn store(&self) -> &CollectionStore {
        &self.store
    }

    #[must_use]
    pub const fn page(&self) -> &P {
        &self.page
    }

    pub fn into_page(self) -> P {
        self.page
    }

    /// Records collected so far, in first-insertion order
    #[must_use]
    pub fn snapshot(&self) -> Vec<CollectedRecord> {
        self.store.snapshot()
    }

    /// The external "stop requested" flag
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<CollectionProgress> {
        self.progress.subscribe()
    }

    /// Performs exactly one state transition and returns the new state
    pub async fn step(&mut self) -> DriverState {
        if self.state == DriverState::Done {
            return DriverState::Done;
        }

        self.state = if self.cancel.is_cancelled() {
            self.finish(StopReason::Cancelled)
        } else {
            match self.state {
                DriverState::Idle => self.start(),
                DriverState::Settling => self.settle().await,
                DriverState::Evaluating => self.evaluate().await,
                DriverState::Scrolling => self.scroll_step().await,
                DriverState::Forcing => self.force_jump().await,
                DriverState::Done => DriverState::Done,
            }
        };
        trace!(state = %self.state, "transition");
        self.publish_progress();
        self.state
    }

    /// Steps until `DONE` and returns the report
    pub async fn run(&mut self) -> RunReport {
        while self.step().await != DriverState::Done {}

        // DONE is only ever entered through `finish`, which records the outcome
        let outcome = self.outcome.unwrap_or(RunOutcome {
            reason: StopReason::Cancelled,
            collected: self.store.size(),
            target: self.config.target_count,
        });
        RunReport {
            run_id: self.run_id,
            outcome,
            records: self.store.snapshot(),
            stats: self.stats.clone(),
        }
    }

    fn start(&mut self) -> DriverState {
        self.stats.started_at = Some(Utc::now());
        info!(
            run_id = %self.run_id,
            "Starting collection (target: {}, max scroll attempts: {}, stall threshold: {})",
            self.config.target_count, self.config.max_scroll_attempts, self.config.stall_threshold
        );
        DriverState::Settling
    }

    async fn settle(&mut self) -> DriverState {
        let cancel = self.cancel.clone();
        let cancelled = tokio::select! {
            () = sleep(self.config.settle_interval()) => false,
            () = cancel.cancelled() => true,
        };
        if cancelled {
            return self.finish(StopReason::Cancelled);
        }
        DriverState::Evaluating
    }

    async fn evaluate(&mut self) -> DriverState {
        self.stats.evaluations += 1;

        // the consecutive error budget is only reset once the slots were read too
        let document_grew = match self.page.geometry().await {
            Ok(geometry) => self.scroll.observe(geometry),
            Err(e) => {
                if self.record_page_error("geometry", &e) {
                    return self.finish(StopReason::PageUnavailable);
                }
                false
            }
        };

        let slots = match self.page.slots().await {
            Ok(slots) => {
                self.consecutive_page_errors = 0;
                slots
            }
            Err(e) => {
                if self.record_page_error("slots", &e) {
                    return self.finish(StopReason::PageUnavailable);
                }
                // unread content must not be scrolled past
                return DriverState::Settling;
            }
        };

        let mut new_unique = 0;
        for content in slots {
            if self.store.size() >= self.config.target_count {
                break;
            }
            if self.cancel.is_cancelled() {
                return self.finish(StopReason::Cancelled);
            }
            if self.process_slot(content).await.is_some_and(UpsertOutcome::is_new) {
                new_unique += 1;
            }
        }

        self.scroll.record_evaluation(new_unique, document_grew);
        debug!(
            "Evaluation #{}: {} new, {} total, stalled {}, grew {}",
            self.stats.evaluations,
            new_unique,
            self.store.size(),
            self.scroll.stalled_evaluations,
            document_grew
        );

        match self.policy.evaluate(self.store.size(), &self.scroll, document_grew) {
            Verdict::Continue => DriverState::Scrolling,
            Verdict::Force => DriverState::Forcing,
            Verdict::Stop(reason) => self.finish(reason),
        }
    }

    /// Change check, enrichment wait, extraction, fingerprint and upsert for
    /// one slot. `None` when the slot was skipped as unchanged.
    async fn process_slot(&mut self, content: SlotContent) -> Option<UpsertOutcome> {
        let handle = content.handle;
        let hash = self.extractor.content_hash(&content);
        if !self.detector.has_changed(handle, hash) {
            self.stats.slots_unchanged += 1;
            trace!(%handle, "slot unchanged");
            return None;
        }

        let wait = self
            .waiter
            .await_enrichment(&self.page, &self.extractor, handle, self.config.enrichment_timeout())
            .await;
        self.stats.page_errors += wait.page_errors;

        // a re-read showing a different item means the slot was recycled meanwhile
        let (content, ready) = match wait.content {
            Some(current) if self.extractor.content_hash(&current) == hash => (current, wait.ready),
            _ => (content, false),
        };
        if !ready {
            self.stats.enrichment_timeouts += 1;
            warn!(
                %handle,
                waited_ms = wait.waited.as_millis() as u64,
                "Enrichment not ready, keeping partial record"
            );
        }

        let draft = self.extractor.extract(&content);
        let fingerprint = self.fingerprints.fingerprint(&draft);
        let record = CollectedRecord::from_draft(
            fingerprint.clone(),
            draft,
            EnrichmentStatus::from_ready(ready),
            Utc::now(),
        );
        let outcome = self.store.upsert(fingerprint.clone(), record);
        self.stats.slots_processed += 1;
        debug!(%handle, %fingerprint, ?outcome, "slot processed");
        Some(outcome)
    }

    async fn scroll_step(&mut self) -> DriverState {
        if let Some(reason) = self.policy.ceiling_reached(&self.scroll) {
            return self.finish(reason);
        }

        let step = self.config.scroll_step(self.scroll.viewport_height) + self.jitter();
        let target = self.scroll.offset.saturating_add(step);
        self.scroll.scroll_attempts += 1;
        self.stats.scroll_attempts = self.scroll.scroll_attempts;

        match self.page.scroll_to(target).await {
            Ok(()) => self.consecutive_page_errors = 0,
            Err(e) => {
                if self.record_page_error("scroll", &e) {
                    return self.finish(StopReason::PageUnavailable);
                }
            }
        }
        DriverState::Settling
    }

    async fn force_jump(&mut self) -> DriverState {
        if let Some(reason) = self.policy.ceiling_reached(&self.scroll) {
            return self.finish(reason);
        }

        self.scroll.scroll_attempts += 1;
        self.scroll.forced_jumps += 1;
        self.stats.scroll_attempts = self.scroll.scroll_attempts;
        self.stats.forced_jumps = self.scroll.forced_jumps;
        info!(
            "Forcing jump to bottom (jump #{}, stalled evaluations: {}, document height: {})",
            self.scroll.forced_jumps, self.scroll.stalled_evaluations, self.scroll.document_height
        );

        match self.page.scroll_to(self.scroll.document_height).await {
            Ok(()) => self.consecutive_page_errors = 0,
            Err(e) => {
                if self.record_page_error("scroll", &e) {
                    return self.finish(StopReason::PageUnavailable);
                }
            }
        }

        match self.page.activate_load_more().await {
            Ok(true) => {
                self.consecutive_page_errors = 0;
                self.stats.load_more_activations += 1;
                debug!("Load-more control activated");
            }
            Ok(false) => self.consecutive_page_errors = 0,
            Err(e) => {
                if self.record_page_error("load more", &e) {
                    return self.finish(StopReason::PageUnavailable);
                }
            }
        }
        DriverState::Scrolling
    }

    fn jitter(&mut self) -> u64 {
        match self.config.scroll_jitter_px {
            0 => 0,
            max => self.rng.u64(0..=u64::from(max)),
        }
    }

    /// Counts a failed page call; true once the consecutive budget is exhausted
    fn record_page_error(&mut self, operation: &str, error: &PageError) -> bool {
        self.stats.page_errors += 1;
        self.consecutive_page_errors += 1;
        warn!(
            "Page {} failed ({} consecutive): {}",
            operation, self.consecutive_page_errors, error
        );
        self.consecutive_page_errors > self.config.max_consecutive_page_errors
    }

    fn finish(&mut self, reason: StopReason) -> DriverState {
        let outcome = RunOutcome {
            reason,
            collected: self.store.size(),
            target: self.config.target_count,
        };
        self.outcome = Some(outcome);
        self.stats.finished_at = Some(Utc::now());

        if outcome.is_partial() {
            info!(
                run_id = %self.run_id,
                "Collection finished early ({}): {}/{} items",
                reason, outcome.collected, outcome.target
            );
        } else {
            info!(
                run_id = %self.run_id,
                "Collection finished ({}): {} items",
                reason, outcome.collected
            );
        }
        DriverState::Done
    }

    fn publish_progress(&self) {
        self.progress.publish(CollectionProgress {
            run_id: self.run_id,
            state: self.state,
            collected: self.store.size(),
            target: self.config.target_count,
            scroll_attempts: self.scroll.scroll_attempts,
            stalled_evaluations: self.scroll.stalled_evaluations,
            forced_jumps: self.scroll.forced_jumps,
            stop_reason: self.outcome.map(|outcome| outcome.reason),
        });
    }
}
