//! Collection defaults and fixed domain constants
//!
//! Values here are the documented defaults of the run configuration and the
//! identity rules. Configuration structs read from these instead of repeating
//! literals.

/// Run configuration defaults
pub mod collector {
    /// Desired number of unique items per run
    pub const DEFAULT_TARGET_COUNT: usize = 100;

    /// Hard ceiling on scroll actions (steps and forced jumps combined)
    pub const DEFAULT_MAX_SCROLL_ATTEMPTS: u32 = 300;

    /// The run is stalled once more than this many consecutive evaluations found no new fingerprint
    pub const DEFAULT_STALL_THRESHOLD: u32 = 6;

    /// Stalled evaluations at the bottom of the page before a forced jump is issued
    pub const DEFAULT_FORCE_AFTER_STALLS: u32 = 2;

    /// Upper bound on waiting for the enrichment marker of one slot (milliseconds)
    pub const DEFAULT_ENRICHMENT_TIMEOUT_MS: u64 = 3000;

    /// Poll interval of the enrichment waiter (milliseconds)
    pub const DEFAULT_ENRICHMENT_POLL_INTERVAL_MS: u64 = 150;

    /// Wait after each scroll action so the page can render new slots (milliseconds)
    pub const DEFAULT_SETTLE_INTERVAL_MS: u64 = 800;

    /// Scroll step as a fraction of the viewport height
    pub const DEFAULT_SCROLL_STEP_RATIO: f64 = 0.8;

    /// Random extra pixels added to each scroll step (0 disables jitter)
    pub const DEFAULT_SCROLL_JITTER_PX: u32 = 0;

    /// Distance from the document end that still counts as "at the bottom" (pixels)
    pub const DEFAULT_BOTTOM_TOLERANCE_PX: u32 = 80;

    /// Consecutive host page failures tolerated before the run gives up
    pub const DEFAULT_MAX_CONSECUTIVE_PAGE_ERRORS: u32 = 5;
}

/// Identity rules
pub mod identity {
    /// Title prefix length (in characters) used by the composite fingerprint
    pub const COMPOSITE_TITLE_CHARS: usize = 30;

    /// Separator between composite fingerprint segments
    pub const COMPOSITE_SEPARATOR: char = '\u{1F}';

    /// Query parameters that carry a stable item identifier in canonical links
    pub const LINK_ID_QUERY_KEYS: &[&str] = &[
        "id",
        "item_id",
        "itemId",
        "goods_id",
        "goodsId",
        "product_id",
        "productId",
        "sku",
    ];

    /// Accepted length range of a link identifier
    pub const LINK_ID_MIN_LEN: usize = 4;
    pub const LINK_ID_MAX_LEN: usize = 64;
}

/// Record export
pub mod record {
    /// Sentinel written for fields no strategy could fill
    pub const UNKNOWN: &str = "unknown";
}

/// Logging defaults
pub mod logging {
    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = false;
    pub const LOG_FILE_NAME: &str = "listing-harvester.log";
    pub const LOG_UTC_OFFSET_HOURS: i32 = 9;
}
