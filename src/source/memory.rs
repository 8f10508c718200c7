//! In-process record source backed by ordered maps.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use super::{Dataset, Page, RecordSource};
use crate::search::AccountDirectory;
use crate::types::{Account, EntityType, Record, SyncResult};

/// Record source holding every table in memory, keyed by id.
#[derive(Default)]
pub struct MemoryRecordSource {
    tables: RwLock<BTreeMap<EntityType, BTreeMap<u64, Record>>>,
}

impl MemoryRecordSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every account, tag, and status of a dataset.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let source = Self::new();
        for account in &dataset.accounts {
            source.insert(Record::Account(account.clone()));
        }
        for tag in &dataset.tags {
            source.insert(Record::Tag(tag.clone()));
        }
        for status in &dataset.statuses {
            source.insert(Record::Status(status.clone()));
        }
        source
    }

    /// Insert or replace a record.
    pub fn insert(&self, record: Record) {
        self.tables
            .write()
            .entry(record.entity())
            .or_default()
            .insert(record.id(), record);
    }

    /// Remove a record entirely (hard delete).
    pub fn remove(&self, entity: EntityType, id: u64) -> Option<Record> {
        self.tables.write().get_mut(&entity)?.remove(&id)
    }

    /// Fetch a record by id regardless of scope.
    pub fn get(&self, entity: EntityType, id: u64) -> Option<Record> {
        self.tables.read().get(&entity)?.get(&id).cloned()
    }

    /// Number of stored records, in scope or not.
    pub fn len(&self, entity: EntityType) -> usize {
        self.tables.read().get(&entity).map_or(0, |t| t.len())
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().values().all(|t| t.is_empty())
    }
}

impl RecordSource for MemoryRecordSource {
    fn list_page(
        &self,
        entity: EntityType,
        after: Option<u64>,
        page_size: usize,
    ) -> SyncResult<Page> {
        let tables = self.tables.read();
        let Some(table) = tables.get(&entity) else {
            return Ok(Page::default());
        };

        let lower = match after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };
        let records: Vec<Record> = table
            .range((lower, Bound::Unbounded))
            .map(|(_, record)| record)
            .filter(|record| record.in_default_scope())
            .take(page_size)
            .cloned()
            .collect();

        let next_cursor = if records.len() == page_size {
            records.last().map(Record::id)
        } else {
            None
        };
        Ok(Page {
            records,
            next_cursor,
        })
    }

    fn count_estimate(&self, entity: EntityType) -> SyncResult<u64> {
        let tables = self.tables.read();
        Ok(tables.get(&entity).map_or(0, |t| {
            t.values().filter(|r| r.in_default_scope()).count() as u64
        }))
    }
}

impl AccountDirectory for MemoryRecordSource {
    fn account(&self, id: u64) -> Option<Account> {
        match self.get(EntityType::Accounts, id)? {
            Record::Account(account) => Some(account),
            _ => None,
        }
    }

    fn find_by_acct(&self, acct: &str) -> Option<Account> {
        let acct = acct.trim_start_matches('@');
        let tables = self.tables.read();
        tables.get(&EntityType::Accounts)?.values().find_map(|r| match r {
            Record::Account(a) if a.acct().eq_ignore_ascii_case(acct) => Some(a.clone()),
            _ => None,
        })
    }
}
