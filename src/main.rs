//! Demo runner: collects from a simulated virtualized listing and prints the
//! run report as JSON on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use listing_harvester::application::ListCollector;
use listing_harvester::infrastructure::{
    ConfigManager, FieldExtractor, GrowthMode, SimulatedItem, SimulatedListPage,
    SimulatedPageOptions, init_logging_with_config,
};

/// Fastest and slowest simulated enrichment arrival
const ENRICHMENT_DELAY_RANGE_MS: (u64, u64) = (100, 900);
const PAGE_BATCH: usize = 40;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "listing-harvester",
    version,
    about = "Collect unique records from a virtualized listing"
)]
struct Cli {
    /// Configuration file (JSON or TOML); defaults to the per-user config file when present
    #[arg(long, env = "HARVESTER_CONFIG")]
    config: Option<PathBuf>,

    /// Number of items in the simulated catalog
    #[arg(long, default_value_t = 200)]
    items: usize,

    /// Overrides the configured target count
    #[arg(long)]
    target: Option<usize>,

    /// Seed for enrichment delays and scroll jitter
    #[arg(long, default_value_t = 7)]
    seed: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = cli.config.clone().map_or_else(ConfigManager::new, ConfigManager::with_path);
    let mut config = manager.load().context("Failed to load configuration")?;
    if let Some(target) = cli.target {
        config.collector.target_count = target;
        config.collector.validate().context("Invalid --target")?;
    }

    init_logging_with_config(&config.logging).context("Failed to initialize logging")?;

    let extractor = FieldExtractor::with_config(&config.extraction)
        .context("Invalid extraction configuration")?;

    let (min_delay, max_delay) = ENRICHMENT_DELAY_RANGE_MS;
    let items = SimulatedItem::catalog_with_jitter(
        cli.items,
        cli.seed,
        Duration::from_millis(min_delay),
        Duration::from_millis(max_delay),
    );
    let page = SimulatedListPage::new(
        items,
        SimulatedPageOptions {
            initially_loaded: PAGE_BATCH,
            growth: GrowthMode::InfiniteScroll { batch: PAGE_BATCH },
            ..SimulatedPageOptions::default()
        },
    );

    let mut collector =
        ListCollector::new(page, config.collector, extractor)?.with_jitter_seed(cli.seed);

    let token = collector.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let report = collector.run().await;
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize run report")?;
    println!("{json}");
    Ok(())
}
