//! The search engine capability consumed by the pipeline.

pub mod local;

pub use local::LocalEngine;

use serde_json::Value;

use crate::search::EngineQuery;
use crate::types::{BulkAck, SyncResult, WritePlan};

/// Operations the pipeline needs from a search engine.
///
/// Implementations must be shareable across worker threads; the coordinator
/// calls `bulk_write` concurrently from every lane.
pub trait SearchEngine: Send + Sync {
    /// Create a concrete index with the given settings body.
    fn create_index(&self, name: &str, settings: &Value) -> SyncResult<()>;

    /// Apply a write plan to a concrete index or a singly-bound alias.
    fn bulk_write(&self, target: &str, plan: &WritePlan) -> SyncResult<BulkAck>;

    /// Concrete indices currently bound to `alias`.
    fn list_aliases(&self, alias: &str) -> SyncResult<Vec<String>>;

    /// Atomically unbind `remove` from and bind `add` to `alias`.
    ///
    /// Either every action is applied or none is.
    fn swap_alias(&self, alias: &str, remove: &[String], add: &[String]) -> SyncResult<()>;

    /// Drop a concrete index and all its data.
    fn delete_index(&self, name: &str) -> SyncResult<()>;

    /// Documents in `target` matching `query`, newest id first.
    fn query(&self, target: &str, query: &EngineQuery) -> SyncResult<Vec<Value>>;
}
