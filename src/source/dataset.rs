//! JSON snapshot of the source-of-truth tables used by the CLI and tests.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{Account, Status, SyncResult, Tag};

/// `account_id` acts on `target_account_id` (blocks, mutes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub account_id: u64,
    pub target_account_id: u64,
}

/// `account_id` hides every account on `domain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainBlock {
    pub account_id: u64,
    pub domain: String,
}

/// Every table the pipeline reads, in one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub statuses: Vec<Status>,
    #[serde(default)]
    pub blocks: Vec<Relation>,
    #[serde(default)]
    pub mutes: Vec<Relation>,
    #[serde(default)]
    pub domain_blocks: Vec<DomainBlock>,
}

impl Dataset {
    /// Load a dataset from a JSON file.
    pub fn read_from_file(path: &Path) -> SyncResult<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Write the dataset as pretty JSON.
    pub fn write_to_file(&self, path: &Path) -> SyncResult<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
