//! Record source adapter: ordered, paginated reads from the source of truth.
//!
//! Synchronization is additive. Every run re-pushes qualifying records and
//! deletes disqualified ones opportunistically; the full id sets of store and
//! index are never diffed.

pub mod dataset;
pub mod memory;

pub use dataset::{Dataset, DomainBlock, Relation};
pub use memory::MemoryRecordSource;

use crate::types::{EntityType, Record, SyncError, SyncResult};

/// One page of records and the cursor to continue from.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Records in ascending id order.
    pub records: Vec<Record>,
    /// Id to pass as `after` for the next page; `None` when exhausted.
    pub next_cursor: Option<u64>,
}

/// The relational store, seen as an id-ordered record stream.
pub trait RecordSource: Send + Sync {
    /// Up to `page_size` in-scope records with id greater than `after`.
    fn list_page(&self, entity: EntityType, after: Option<u64>, page_size: usize)
        -> SyncResult<Page>;

    /// Cheap, possibly stale number of in-scope records.
    fn count_estimate(&self, entity: EntityType) -> SyncResult<u64>;

    /// Estimate for progress reporting; failures degrade to unknown.
    fn estimate_count(&self, entity: EntityType) -> Option<u64> {
        match self.count_estimate(entity) {
            Ok(n) => Some(n),
            Err(e) => {
                log::warn!("Could not estimate {} count: {}", entity, e);
                None
            }
        }
    }
}

/// Lazily iterate every page of `entity`.
pub fn pages(source: &dyn RecordSource, entity: EntityType, page_size: usize) -> Pages<'_> {
    Pages::new(source, entity, page_size)
}

/// Forward-only page iterator driven by `list_page`.
///
/// Empty pages are skipped. Records inserted behind the cursor while the
/// iterator is running are not revisited.
pub struct Pages<'a> {
    source: &'a dyn RecordSource,
    entity: EntityType,
    page_size: usize,
    cursor: Option<u64>,
    done: bool,
}

impl<'a> Pages<'a> {
    pub fn new(source: &'a dyn RecordSource, entity: EntityType, page_size: usize) -> Self {
        Self {
            source,
            entity,
            page_size: page_size.max(1),
            cursor: None,
            done: false,
        }
    }
}

impl Iterator for Pages<'_> {
    type Item = SyncResult<Vec<Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let page = match self.source.list_page(self.entity, self.cursor, self.page_size) {
                Ok(page) => page,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            match page.next_cursor {
                Some(next) if self.cursor.is_some_and(|c| next <= c) => {
                    self.done = true;
                    return Some(Err(SyncError::Source(format!(
                        "cursor for {} did not advance past {}",
                        self.entity, next
                    ))));
                }
                Some(next) => self.cursor = Some(next),
                None => self.done = true,
            }

            if !page.records.is_empty() {
                return Some(Ok(page.records));
            }
        }
        None
    }
}
