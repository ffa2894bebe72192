//! End-to-end runs of the collector against the simulated virtualized page
use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use listing_harvester::application::ListCollector;
use listing_harvester::domain::{
    DriverState, EnrichmentStatus, FieldValue, PageGeometry, RecordField, SlotContent, SlotHandle,
    StopReason,
};
use listing_harvester::infrastructure::{
    CollectorConfig, EnrichmentArrival, FieldExtractor, GrowthMode, MarkupVariant, PageDriver,
    PageError, PageResult, SimulatedItem, SimulatedListPage, SimulatedPageOptions,
};

fn collector(
    items: Vec<SimulatedItem>,
    options: SimulatedPageOptions,
    config: CollectorConfig,
) -> ListCollector<SimulatedListPage> {
    let page = SimulatedListPage::new(items, options);
    let extractor = FieldExtractor::new().expect("default extraction config");
    ListCollector::new(page, config, extractor).expect("valid config")
}

/// Geometry answers, the slot query never does
struct SlotQueryDown;

#[async_trait]
impl PageDriver for SlotQueryDown {
    async fn slots(&self) -> PageResult<Vec<SlotContent>> {
        Err(PageError::query_failed("slots", "list container detached"))
    }

    async fn slot(&self, _handle: SlotHandle) -> PageResult<Option<SlotContent>> {
        Err(PageError::query_failed("slot", "list container detached"))
    }

    async fn geometry(&self) -> PageResult<PageGeometry> {
        Ok(PageGeometry {
            scroll_offset: 0,
            viewport_height: 600,
            document_height: 4_000,
        })
    }

    async fn scroll_to(&mut self, _offset: u64) -> PageResult<()> {
        Ok(())
    }

    async fn activate_load_more(&mut self) -> PageResult<bool> {
        Ok(false)
    }
}

fn item_ids(records: &[listing_harvester::CollectedRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.get(RecordField::ItemId).to_string())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn target_reached_with_enough_items() {
    let config = CollectorConfig { target_count: 50, ..CollectorConfig::default() };
    let mut collector =
        collector(SimulatedItem::catalog(200), SimulatedPageOptions::default(), config);
    let progress = collector.subscribe();

    let report = collector.run().await;

    assert_eq!(collector.state(), DriverState::Done);
    assert_eq!(report.outcome.reason, StopReason::TargetReached);
    assert!(!report.outcome.is_partial());
    assert_eq!(report.records.len(), 50);
    assert!(report.records.iter().all(|r| r.enrichment_status == EnrichmentStatus::Complete));

    let expected: Vec<String> = (0..50).map(|i| (600_000 + i).to_string()).collect();
    assert_eq!(item_ids(&report.records), expected);

    let fingerprints: HashSet<_> = report.records.iter().map(|r| r.fingerprint.clone()).collect();
    assert_eq!(fingerprints.len(), 50);

    let latest = progress.borrow().clone();
    assert_eq!(latest.state, DriverState::Done);
    assert_eq!(latest.collected, 50);
    assert_eq!(latest.stop_reason, Some(StopReason::TargetReached));
}

#[tokio::test(start_paused = true)]
async fn short_page_stalls_after_forced_jumps() {
    let config = CollectorConfig {
        target_count: 500,
        stall_threshold: 4,
        force_after_stalls: 2,
        ..CollectorConfig::default()
    };
    let mut collector =
        collector(SimulatedItem::catalog(80), SimulatedPageOptions::default(), config);

    let report = collector.run().await;

    assert_eq!(report.outcome.reason, StopReason::Stalled);
    assert!(report.outcome.is_partial());
    assert_eq!(report.records.len(), 80);
    assert_eq!(report.stats.forced_jumps, 3);
    assert_eq!(report.stats.load_more_activations, 0);
}

#[tokio::test(start_paused = true)]
async fn load_more_growth_resets_stall_counter() {
    let options = SimulatedPageOptions {
        initially_loaded: 20,
        growth: GrowthMode::LoadMoreButton { batch: 20 },
        ..SimulatedPageOptions::default()
    };
    let config = CollectorConfig {
        target_count: 500,
        stall_threshold: 4,
        force_after_stalls: 2,
        ..CollectorConfig::default()
    };
    let mut collector = collector(SimulatedItem::catalog(80), options, config);

    let report = collector.run().await;

    // three jumps grow the document, three more find nothing left to load
    assert_eq!(report.outcome.reason, StopReason::Stalled);
    assert_eq!(report.records.len(), 80);
    assert_eq!(collector.page().loaded_items(), 80);
    assert_eq!(report.stats.load_more_activations, 3);
    assert_eq!(report.stats.forced_jumps, 6);
}

#[tokio::test(start_paused = true)]
async fn infinite_scroll_keeps_growing_until_target() {
    let options = SimulatedPageOptions {
        initially_loaded: 30,
        growth: GrowthMode::InfiniteScroll { batch: 30 },
        ..SimulatedPageOptions::default()
    };
    let config = CollectorConfig { target_count: 120, ..CollectorConfig::default() };
    let mut collector = collector(SimulatedItem::catalog(120), options, config);

    let report = collector.run().await;

    assert_eq!(report.outcome.reason, StopReason::TargetReached);
    assert_eq!(report.records.len(), 120);
    assert_eq!(collector.page().loaded_items(), 120);
}

#[tokio::test(start_paused = true)]
async fn missing_enrichment_yields_partial_record() {
    let mut items = SimulatedItem::catalog(30);
    items[4] = items[4].clone().with_enrichment(EnrichmentArrival::Never);
    let config = CollectorConfig {
        target_count: 10,
        enrichment_timeout_ms: 1_000,
        ..CollectorConfig::default()
    };
    let mut collector = collector(items, SimulatedPageOptions::default(), config);

    let report = collector.run().await;
    assert_eq!(report.outcome.reason, StopReason::TargetReached);
    assert_eq!(report.stats.enrichment_timeouts, 1);

    let partial: Vec<_> = report
        .records
        .iter()
        .filter(|r| r.enrichment_status == EnrichmentStatus::Partial)
        .collect();
    assert_eq!(partial.len(), 1);
    let record = partial[0];
    assert_eq!(record.get(RecordField::ItemId).as_known(), Some("600004"));
    assert!(record.get(RecordField::Title).is_known());
    assert!(record.get(RecordField::Price).is_known());
    assert!(record.get(RecordField::Link).is_known());
    assert_eq!(record.get(RecordField::MonthlySales), &FieldValue::Unknown);
    assert_eq!(record.get(RecordField::Rating), &FieldValue::Unknown);

    let complete = report
        .records
        .iter()
        .find(|r| r.enrichment_status == EnrichmentStatus::Complete)
        .unwrap();
    assert!(complete.get(RecordField::MonthlySales).is_known());
}

#[tokio::test(start_paused = true)]
async fn composite_collision_collapses_distinct_items() {
    let mut items = SimulatedItem::catalog(20);
    for (index, colour) in [(3, "blue"), (4, "green")] {
        let mut item = items[index].clone().without_link();
        item.title = format!("Handmade ceramic coffee mug with lid - {colour}");
        item.price = "¥25.00".to_string();
        item.image = "https://img.example.com/shared/mug.jpg".to_string();
        items[index] = item;
    }
    let config = CollectorConfig { target_count: 100, ..CollectorConfig::default() };
    let mut collector = collector(items, SimulatedPageOptions::default(), config);

    let report = collector.run().await;

    // a known limitation: same 30-char title prefix, price and image stem means one record
    assert_eq!(report.records.len(), 19);
    let composite: Vec<_> = report
        .records
        .iter()
        .filter(|r| !r.fingerprint.is_link_id())
        .collect();
    assert_eq!(composite.len(), 1);
    assert_eq!(
        composite[0].get(RecordField::Title).as_known(),
        Some("Handmade ceramic coffee mug with lid - green")
    );
}

#[tokio::test(start_paused = true)]
async fn scroll_ceiling_ends_run_with_partial_outcome() {
    let config = CollectorConfig {
        target_count: 200,
        max_scroll_attempts: 4,
        ..CollectorConfig::default()
    };
    let mut collector =
        collector(SimulatedItem::catalog(200), SimulatedPageOptions::default(), config);

    let report = collector.run().await;

    assert_eq!(report.outcome.reason, StopReason::ScrollCeiling);
    assert!(report.outcome.is_partial());
    assert_eq!(collector.page().scroll_calls(), 4);
    assert_eq!(report.stats.scroll_attempts, 4);
    assert!(!report.records.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_keeps_collected_snapshot() {
    let mut collector = collector(
        SimulatedItem::catalog(200),
        SimulatedPageOptions::default(),
        CollectorConfig::default(),
    );
    while collector.store().size() < 10 {
        collector.step().await;
    }
    collector.cancellation_token().cancel();

    let report = collector.run().await;

    assert_eq!(report.outcome.reason, StopReason::Cancelled);
    assert_eq!(report.records.len(), collector.snapshot().len());
    assert!(report.records.len() >= 10);
}

#[tokio::test(start_paused = true)]
async fn transient_page_errors_are_tolerated() {
    let page = SimulatedListPage::new(SimulatedItem::catalog(100), SimulatedPageOptions::default());
    page.inject_failures(3);
    let config = CollectorConfig { target_count: 20, ..CollectorConfig::default() };
    let mut collector = ListCollector::new(page, config, FieldExtractor::new().unwrap()).unwrap();

    let report = collector.run().await;

    assert_eq!(report.outcome.reason, StopReason::TargetReached);
    assert_eq!(report.stats.page_errors, 3);
}

#[tokio::test(start_paused = true)]
async fn unreachable_page_stops_without_records() {
    let page = SimulatedListPage::new(SimulatedItem::catalog(100), SimulatedPageOptions::default());
    page.inject_failures(1_000);
    let mut collector =
        ListCollector::new(page, CollectorConfig::default(), FieldExtractor::new().unwrap())
            .unwrap();

    let report = collector.run().await;

    assert_eq!(report.outcome.reason, StopReason::PageUnavailable);
    assert!(report.records.is_empty());
    assert_eq!(report.stats.page_errors, 6);
}

#[tokio::test(start_paused = true)]
async fn failing_slot_query_exhausts_error_budget_despite_working_geometry() {
    let config = CollectorConfig {
        max_scroll_attempts: 5,
        ..CollectorConfig::default()
    };
    let extractor = FieldExtractor::new().unwrap();
    let mut collector = ListCollector::new(SlotQueryDown, config, extractor).unwrap();

    let mut steps = 0;
    while collector.step().await != DriverState::Done {
        steps += 1;
        assert!(steps <= 100, "collector kept re-evaluating a page it cannot read");
    }

    let outcome = collector.outcome().unwrap();
    assert_eq!(outcome.reason, StopReason::PageUnavailable);
    assert_eq!(collector.stats().page_errors, 6);
    assert_eq!(collector.stats().scroll_attempts, 0);
    assert!(collector.snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn bare_markup_is_recovered_by_fallback_strategies() {
    let options =
        SimulatedPageOptions { markup: MarkupVariant::Bare, ..SimulatedPageOptions::default() };
    let config = CollectorConfig { target_count: 15, ..CollectorConfig::default() };
    let mut collector = collector(SimulatedItem::catalog(60), options, config);

    let report = collector.run().await;

    assert_eq!(report.outcome.reason, StopReason::TargetReached);
    for (index, record) in report.records.iter().enumerate() {
        assert!(record.fingerprint.is_link_id());
        assert_eq!(
            record.get(RecordField::Title).as_known(),
            Some(format!("Listing {index:04} stainless steel insulated travel mug 500ml").as_str())
        );
        assert!(record.get(RecordField::ImageUrl).is_known());
    }
}

#[tokio::test(start_paused = true)]
async fn every_run_terminates_within_step_bound() {
    for (items, ceiling) in [(0, 3), (5, 10), (50, 25), (300, 40)] {
        let config = CollectorConfig {
            target_count: 10_000,
            max_scroll_attempts: ceiling,
            settle_interval_ms: 10,
            enrichment_timeout_ms: 20,
            enrichment_poll_interval_ms: 10,
            ..CollectorConfig::default()
        };
        let mut collector =
            collector(SimulatedItem::catalog(items), SimulatedPageOptions::default(), config);
        let bound = 4 * (ceiling as usize + 2);
        let mut steps = 0;
        while collector.step().await != DriverState::Done {
            steps += 1;
            assert!(steps <= bound, "run over {items} items did not terminate");
        }
    }
}

#[tokio::test(start_paused = true)]
async fn enrichment_delays_within_budget_are_all_complete() {
    let items = SimulatedItem::catalog_with_jitter(
        60,
        42,
        Duration::from_millis(100),
        Duration::from_millis(2_500),
    );
    let config = CollectorConfig {
        target_count: 40,
        settle_interval_ms: 200,
        scroll_jitter_px: 60,
        ..CollectorConfig::default()
    };
    let mut collector =
        collector(items, SimulatedPageOptions::default(), config).with_jitter_seed(9);

    let report = collector.run().await;

    assert_eq!(report.outcome.reason, StopReason::TargetReached);
    assert!(report.records.iter().all(|r| r.enrichment_status == EnrichmentStatus::Complete));
    assert_eq!(report.stats.enrichment_timeouts, 0);
}
