//! In-memory virtualized list page
//!
//! Renders a catalog through a fixed pool of recycled slots the way
//! virtualized marketplace listings do: item `i` occupies slot
//! `i % slot_count` while it is inside the rendered window. The enrichment
//! marker appears in a slot once its item has been rendered continuously for
//! the item's enrichment delay. Time is read from `tokio::time`, so tests with
//! a paused clock are deterministic.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::page::{PageDriver, PageError, PageResult};
use crate::domain::{PageGeometry, SlotContent, SlotHandle};

/// When the third-party annotation shows up for an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentArrival {
    After(Duration),
    Never,
}

/// How the document grows beyond the initially loaded items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthMode {
    Static,
    /// Reaching the bottom loads the next batch
    InfiniteScroll { batch: usize },
    /// Only an explicit "load more" activation loads the next batch
    LoadMoreButton { batch: usize },
}

/// Markup flavour of rendered cards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupVariant {
    /// Styled class names on title, price, shop and sold nodes
    Styled,
    /// Unstyled nodes; title only recoverable by heuristics or accessible text
    Bare,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedItem {
    pub link: Option<String>,
    pub title: String,
    pub price: String,
    pub image: String,
    pub shop: String,
    pub sold: String,
    pub annotation: String,
    pub enrichment: EnrichmentArrival,
}

impl SimulatedItem {
    /// Deterministic catalog entry `index`
    #[must_use]
    pub fn generated(index: usize) -> Self {
        let id = 600_000 + index;
        Self {
            link: Some(format!("https://shop.example.com/item/{id}.html?spm=list.{index}")),
            title: format!("Listing {index:04} stainless steel insulated travel mug 500ml"),
            price: format!("¥{}.{:02}", 10 + index % 90, index % 100),
            image: format!("https://img.example.com/bao/O1CN01{id:08}.jpg_220x220.jpg"),
            shop: format!("Store {}", index % 17),
            sold: format!("{}+ sold", (index % 50) * 10),
            annotation: format!(
                concat!(
                    "Monthly sales: {}.{}万件 | Total sales: {} | Reviews: {} | ",
                    "Rating: 4.{} | Listed: 2024-03-{:02}",
                ),
                index % 9 + 1,
                index % 10,
                (index + 1) * 1_000 + 234,
                index * 3 + 11,
                index % 10,
                index % 28 + 1
            ),
            enrichment: EnrichmentArrival::After(Duration::from_millis(300)),
        }
    }

    #[must_use]
    pub fn catalog(len: usize) -> Vec<Self> {
        (0..len).map(Self::generated).collect()
    }

    /// Catalog with enrichment delays spread in `[min, max]` using a seeded generator
    #[must_use]
    pub fn catalog_with_jitter(len: usize, seed: u64, min: Duration, max: Duration) -> Vec<Self> {
        let mut rng = fastrand::Rng::with_seed(seed);
        let span = max.saturating_sub(min).as_millis() as u64;
        (0..len)
            .map(|index| {
                let mut item = Self::generated(index);
                let delay = min + Duration::from_millis(rng.u64(0..=span));
                item.enrichment = EnrichmentArrival::After(delay);
                item
            })
            .collect()
    }

    #[must_use]
    pub fn without_link(mut self) -> Self {
        self.link = None;
        self
    }

    #[must_use]
    pub const fn with_enrichment(mut self, enrichment: EnrichmentArrival) -> Self {
        self.enrichment = enrichment;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedPageOptions {
    pub slot_count: usize,
    pub row_height: u64,
    pub viewport_height: u64,
    pub initially_loaded: usize,
    pub growth: GrowthMode,
    pub markup: MarkupVariant,
}

impl Default for SimulatedPageOptions {
    fn default() -> Self {
        Self {
            slot_count: 10,
            row_height: 100,
            viewport_height: 600,
            initially_loaded: usize::MAX,
            growth: GrowthMode::Static,
            markup: MarkupVariant::Styled,
        }
    }
}

pub struct SimulatedListPage {
    items: Vec<SimulatedItem>,
    options: SimulatedPageOptions,
    loaded: usize,
    offset: u64,
    rendered_since: HashMap<usize, Instant>,
    pending_failures: AtomicU32,
    scroll_calls: u32,
    load_more_calls: u32,
}

impl SimulatedListPage {
    #[must_use]
    pub fn new(items: Vec<SimulatedItem>, options: SimulatedPageOptions) -> Self {
        let options = SimulatedPageOptions {
            slot_count: options.slot_count.max(1),
            row_height: options.row_height.max(1),
            ..options
        };
        let loaded = options.initially_loaded.min(items.len());
        let mut page = Self {
            items,
            options,
            loaded,
            offset: 0,
            rendered_since: HashMap::new(),
            pending_failures: AtomicU32::new(0),
            scroll_calls: 0,
            load_more_calls: 0,
        };
        page.refresh_window();
        page
    }

    /// Makes the next `count` read queries fail
    pub fn inject_failures(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    #[must_use]
    pub const fn loaded_items(&self) -> usize {
        self.loaded
    }

    #[must_use]
    pub const fn scroll_calls(&self) -> u32 {
        self.scroll_calls
    }

    #[must_use]
    pub const fn load_more_calls(&self) -> u32 {
        self.load_more_calls
    }

    fn take_failure(&self, query: &str) -> PageResult<()> {
        let remaining = self.pending_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.pending_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(PageError::query_failed(query, "injected failure"));
        }
        Ok(())
    }

    const fn document_height(&self) -> u64 {
        self.loaded as u64 * self.options.row_height
    }

    fn window(&self) -> std::ops::Range<usize> {
        let start = (self.offset / self.options.row_height) as usize;
        let start = start.min(self.loaded);
        let end = (start + self.options.slot_count).min(self.loaded);
        start..end
    }

    fn refresh_window(&mut self) {
        let window = self.window();
        let now = Instant::now();
        self.rendered_since.retain(|index, _| window.contains(index));
        for index in window {
            self.rendered_since.entry(index).or_insert(now);
        }
    }

    fn load_batch(&mut self, batch: usize) -> bool {
        if self.loaded >= self.items.len() {
            return false;
        }
        self.loaded = (self.loaded + batch.max(1)).min(self.items.len());
        debug!(loaded = self.loaded, "simulated page loaded another batch");
        true
    }

    fn is_enriched(&self, index: usize) -> bool {
        match self.items[index].enrichment {
            EnrichmentArrival::Never => false,
            EnrichmentArrival::After(delay) => self
                .rendered_since
                .get(&index)
                .is_some_and(|since| since.elapsed() >= delay),
        }
    }

    fn render(&self, index: usize) -> SlotContent {
        let slot = index % self.options.slot_count;
        let item = &self.items[index];
        let mut html = String::with_capacity(512);
        let _ = write!(html, r#"<div class="item-card" data-slot="{slot}">"#);

        match self.options.markup {
            MarkupVariant::Styled => {
                let _ = write!(
                    html,
                    concat!(
                        r#"<a class="item-link" href="{href}" title="{title}">"#,
                        r#"<img class="item-img" src="{img}" alt="{title}">"#,
                        r#"<span class="item-title">{title}</span></a>"#,
                        r#"<div class="item-price"><em>{price}</em></div>"#,
                        r#"<div class="shop-name">{shop}</div>"#,
                        r#"<span class="sold-count">{sold}</span>"#,
                    ),
                    href = item.link.as_deref().map(escape).unwrap_or_default(),
                    title = escape(&item.title),
                    img = escape(&item.image),
                    price = escape(&item.price),
                    shop = escape(&item.shop),
                    sold = escape(&item.sold),
                );
            }
            MarkupVariant::Bare => {
                let _ = write!(
                    html,
                    concat!(
                        r#"<a href="{href}" aria-label="{title}"><img data-src="{img}"></a>"#,
                        r#"<div><div>{title}</div><div>{price}</div><div>{sold}</div></div>"#,
                    ),
                    href = item.link.as_deref().map(escape).unwrap_or_default(),
                    title = escape(&item.title),
                    img = escape(&item.image),
                    price = escape(&item.price),
                    sold = escape(&item.sold),
                );
            }
        }

        if self.is_enriched(index) {
            let _ = write!(
                html,
                r#"<div class="enrich-panel" data-enrichment="ready">{}</div>"#,
                escape(&item.annotation)
            );
        }
        html.push_str("</div>");
        SlotContent::new(SlotHandle::new(slot as u32), html)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
impl PageDriver for SimulatedListPage {
    async fn slots(&self) -> PageResult<Vec<SlotContent>> {
        self.take_failure("slots")?;
        Ok(self.window().map(|index| self.render(index)).collect())
    }

    async fn slot(&self, handle: SlotHandle) -> PageResult<Option<SlotContent>> {
        self.take_failure("slot")?;
        let slot = handle.index() as usize;
        Ok(self
            .window()
            .find(|index| index % self.options.slot_count == slot)
            .map(|index| self.render(index)))
    }

    async fn geometry(&self) -> PageResult<PageGeometry> {
        self.take_failure("geometry")?;
        Ok(PageGeometry {
            scroll_offset: self.offset,
            viewport_height: self.options.viewport_height,
            document_height: self.document_height(),
        })
    }

    async fn scroll_to(&mut self, offset: u64) -> PageResult<()> {
        self.scroll_calls += 1;
        let max_offset = self.document_height().saturating_sub(self.options.viewport_height);
        self.offset = offset.min(max_offset);

        if let GrowthMode::InfiniteScroll { batch } = self.options.growth {
            let at_bottom = self.offset + self.options.viewport_height >= self.document_height();
            if at_bottom {
                self.load_batch(batch);
            }
        }
        self.refresh_window();
        Ok(())
    }

    async fn activate_load_more(&mut self) -> PageResult<bool> {
        self.load_more_calls += 1;
        let GrowthMode::LoadMoreButton { batch } = self.options.growth else {
            return Ok(false);
        };
        let loaded = self.load_batch(batch);
        self.refresh_window();
        Ok(loaded)
    }
}
