//! Host page seam
//!
//! The collector only talks to the page through [`PageDriver`]: read-only
//! queries for the rendered slots and the page geometry, plus the two writes
//! "scroll to offset" and "activate load more". A browser automation backend
//! and [`SimulatedListPage`](super::SimulatedListPage) both implement it.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{PageGeometry, SlotContent, SlotHandle};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("Host page is not reachable: {0}")]
    Unavailable(String),

    #[error("Query '{query}' failed: {reason}")]
    QueryFailed { query: String, reason: String },

    #[error("Scroll to {offset} failed: {reason}")]
    ScrollFailed { offset: u64, reason: String },
}

impl PageError {
    pub fn query_failed(query: &str, reason: impl ToString) -> Self {
        Self::QueryFailed {
            query: query.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type PageResult<T> = Result<T, PageError>;

#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Slots currently rendered, in any order
    async fn slots(&self) -> PageResult<Vec<SlotContent>>;

    /// Current content of one slot; `None` if the slot is not rendered right now
    async fn slot(&self, handle: SlotHandle) -> PageResult<Option<SlotContent>>;

    async fn geometry(&self) -> PageResult<PageGeometry>;

    async fn scroll_to(&mut self, offset: u64) -> PageResult<()>;

    /// Activates a "load more" control if the page shows one; returns whether one was found
    async fn activate_load_more(&mut self) -> PageResult<bool>;
}
