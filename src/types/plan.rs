//! Write plans submitted to the search engine's bulk endpoint.

use serde::Serialize;
use serde_json::Value;

/// A single bulk operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOp {
    /// Create or replace the document with this id.
    Upsert { id: u64, document: Value },
    /// Remove the document with this id, whether or not it is present.
    Delete { id: u64 },
}

impl WriteOp {
    pub fn id(&self) -> u64 {
        match self {
            Self::Upsert { id, .. } | Self::Delete { id } => *id,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }
}

/// Operations derived from one slice of source records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WritePlan {
    pub ops: Vec<WriteOp>,
    /// Number of upserts that became deletes because nobody may see the record.
    pub overridden: usize,
}

impl WritePlan {
    pub fn upserts(&self) -> usize {
        self.ops.iter().filter(|op| !op.is_delete()).count()
    }

    pub fn deletes(&self) -> usize {
        self.ops.iter().filter(|op| op.is_delete()).count()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Per-item outcome counts of an accepted bulk request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkAck {
    /// Documents created or replaced.
    pub indexed: usize,
    /// Deletes that removed an existing document.
    pub deleted: usize,
    /// Deletes whose document was already absent.
    pub not_found: usize,
}
