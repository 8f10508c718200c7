//! search-deploy: search index deployment and sync.
//!
//! Deploys versioned search indices behind stable aliases, streams records
//! from the relational store into them with a bounded worker pool, and serves
//! status searches that respect per-viewer visibility.

pub mod backend;
pub mod cli;
pub mod config;
pub mod engine;
pub mod feed;
pub mod index;
pub mod search;
pub mod source;
pub mod types;

// Re-export commonly used types at the crate root
pub use backend::{LocalEngine, SearchEngine};
pub use config::{resolve_config, DeployConfig};
pub use engine::{
    promote, BatchTransformer, DeployLock, DeployOptions, DeployReport, Deployer, FailurePolicy,
    FailureStage, IndexOutcome, Progress, ProgressSnapshot, Promotion,
};
pub use feed::{precompute_feed, HomeFeed, MemoryFlags, RegenerationFlags};
pub use index::{
    build_document, FileFingerprintStore, FingerprintStore, IndexDefinition, IndexRegistry,
    MemoryFingerprintStore, VersionedIndex,
};
pub use search::{
    AccountDirectory, Backend, MemoryRelationships, RelationshipSource, SearchHit, SearchRequest,
    SearchResults, StatusSearch,
};
pub use source::{pages, Dataset, MemoryRecordSource, Page, RecordSource};
pub use types::{
    Account, BulkAck, EntityType, Record, Status, SyncError, SyncResult, Tag, Visibility, WriteOp,
    WritePlan,
};
