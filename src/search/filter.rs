//! Viewer-relative post-filtering of search hits.
//!
//! Relationship state changes faster than the index refreshes, so these
//! checks run on retrieved hits and are never pushed into the engine query.

use std::collections::{BTreeSet, HashSet};

use parking_lot::RwLock;

use super::SearchHit;
use crate::source::Dataset;
use crate::types::SyncResult;

/// The viewer's relationships to every candidate author of one request.
#[derive(Debug, Clone, Default)]
pub struct RelationshipSnapshot {
    pub blocking: HashSet<u64>,
    pub blocked_by: HashSet<u64>,
    pub muting: HashSet<u64>,
    pub domain_blocking: HashSet<String>,
    /// Authors removed by moderation, hidden from everyone.
    pub suspended: HashSet<u64>,
}

impl RelationshipSnapshot {
    /// Whether `hit` must be hidden from the viewer.
    pub fn filtered(&self, hit: &SearchHit) -> bool {
        if self.suspended.contains(&hit.account_id) {
            return true;
        }
        if self.blocking.contains(&hit.account_id)
            || self.blocked_by.contains(&hit.account_id)
            || self.muting.contains(&hit.account_id)
        {
            return true;
        }
        hit.account_domain
            .as_ref()
            .is_some_and(|domain| self.domain_blocking.contains(&domain.to_lowercase()))
    }
}

/// Relationship data in the source of truth.
pub trait RelationshipSource: Send + Sync {
    /// One batched lookup covering every candidate author and domain.
    fn relations_map(
        &self,
        viewer: Option<u64>,
        account_ids: &[u64],
        domains: &[String],
    ) -> SyncResult<RelationshipSnapshot>;
}

#[derive(Default)]
struct RelationTables {
    blocks: BTreeSet<(u64, u64)>,
    mutes: BTreeSet<(u64, u64)>,
    domain_blocks: BTreeSet<(u64, String)>,
    suspended: BTreeSet<u64>,
}

/// Relationship tables held in memory.
#[derive(Default)]
pub struct MemoryRelationships {
    tables: RwLock<RelationTables>,
}

impl MemoryRelationships {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load blocks, mutes, domain blocks, and suspensions from a dataset.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let relationships = Self::new();
        for r in &dataset.blocks {
            relationships.block(r.account_id, r.target_account_id);
        }
        for r in &dataset.mutes {
            relationships.mute(r.account_id, r.target_account_id);
        }
        for b in &dataset.domain_blocks {
            relationships.block_domain(b.account_id, &b.domain);
        }
        for a in dataset.accounts.iter().filter(|a| a.suspended) {
            relationships.suspend(a.id);
        }
        relationships
    }

    pub fn block(&self, account_id: u64, target: u64) {
        self.tables.write().blocks.insert((account_id, target));
    }

    pub fn mute(&self, account_id: u64, target: u64) {
        self.tables.write().mutes.insert((account_id, target));
    }

    pub fn block_domain(&self, account_id: u64, domain: &str) {
        self.tables
            .write()
            .domain_blocks
            .insert((account_id, domain.to_lowercase()));
    }

    pub fn suspend(&self, account_id: u64) {
        self.tables.write().suspended.insert(account_id);
    }
}

impl RelationshipSource for MemoryRelationships {
    fn relations_map(
        &self,
        viewer: Option<u64>,
        account_ids: &[u64],
        domains: &[String],
    ) -> SyncResult<RelationshipSnapshot> {
        let tables = self.tables.read();
        let mut snapshot = RelationshipSnapshot {
            suspended: account_ids
                .iter()
                .copied()
                .filter(|id| tables.suspended.contains(id))
                .collect(),
            ..Default::default()
        };

        let Some(viewer) = viewer else {
            return Ok(snapshot);
        };
        for &id in account_ids {
            if tables.blocks.contains(&(viewer, id)) {
                snapshot.blocking.insert(id);
            }
            if tables.blocks.contains(&(id, viewer)) {
                snapshot.blocked_by.insert(id);
            }
            if tables.mutes.contains(&(viewer, id)) {
                snapshot.muting.insert(id);
            }
        }
        for domain in domains {
            let domain = domain.to_lowercase();
            if tables.domain_blocks.contains(&(viewer, domain.clone())) {
                snapshot.domain_blocking.insert(domain);
            }
        }
        Ok(snapshot)
    }
}
