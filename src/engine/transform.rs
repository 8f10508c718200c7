//! Visibility-aware conversion of source records into write plans.

use crate::index::build_document;
use crate::types::{Record, WriteOp, WritePlan};

/// Turns a slice of records into bulk operations.
///
/// A status nobody may search for is deleted from the index even though it
/// still exists in the source; deletion here is a privacy control. Records
/// outside the source's default scope are deleted as well.
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchTransformer;

impl BatchTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Build the write plan for `records`, preserving their order.
    pub fn transform(&self, records: &[Record]) -> WritePlan {
        let mut plan = WritePlan {
            ops: Vec::with_capacity(records.len()),
            overridden: 0,
        };

        for record in records {
            let id = record.id();
            if !record.in_default_scope() {
                plan.ops.push(WriteOp::Delete { id });
                continue;
            }
            if let Record::Status(status) = record {
                if status.eligible_audience().is_empty() {
                    plan.ops.push(WriteOp::Delete { id });
                    plan.overridden += 1;
                    continue;
                }
            }
            plan.ops.push(WriteOp::Upsert {
                id,
                document: build_document(record),
            });
        }
        plan
    }
}
