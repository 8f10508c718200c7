//! Run-wide counters shared by every worker lane.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;

use crate::types::{BulkAck, WritePlan};

/// Counters updated concurrently by import units.
///
/// Every field is an atomic so increments from different lanes never lose
/// updates.
#[derive(Debug, Default)]
pub struct Progress {
    estimated_total: AtomicU64,
    indeterminate: AtomicBool,
    reserved: AtomicU64,
    completed: AtomicU64,
    added: AtomicU64,
    removed: AtomicU64,
    overridden: AtomicU64,
    lost_batches: AtomicU64,
    lost_records: AtomicU64,
}

/// A point-in-time copy of [`Progress`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// `None` once the estimate proved wrong or could not be taken.
    pub total: Option<u64>,
    pub completed: u64,
    pub added: u64,
    pub removed: u64,
    pub overridden: u64,
    pub lost_batches: u64,
    pub lost_records: u64,
}

impl Progress {
    /// Start with an estimate; `None` means unknown from the outset.
    pub fn new(estimated_total: Option<u64>) -> Self {
        let progress = Self::default();
        match estimated_total {
            Some(total) => progress.estimated_total.store(total, Ordering::Relaxed),
            None => progress.indeterminate.store(true, Ordering::Relaxed),
        }
        progress
    }

    /// Called before a unit starts on `records` records.
    ///
    /// Switches to indeterminate when the work would overshoot the estimate,
    /// so the display never passes 100%.
    pub fn reserve(&self, records: usize) {
        let reserved = self.reserved.fetch_add(records as u64, Ordering::AcqRel) + records as u64;
        if reserved > self.estimated_total.load(Ordering::Acquire) {
            self.indeterminate.store(true, Ordering::Release);
        }
    }

    /// Account for a slice the engine accepted.
    pub fn record_success(&self, records: usize, plan: &WritePlan, ack: BulkAck) {
        self.completed.fetch_add(records as u64, Ordering::AcqRel);
        self.added.fetch_add(ack.indexed as u64, Ordering::AcqRel);
        self.removed.fetch_add(ack.deleted as u64, Ordering::AcqRel);
        self.overridden.fetch_add(plan.overridden as u64, Ordering::AcqRel);
    }

    /// Account for a slice that was dropped after a failed write.
    pub fn record_lost(&self, records: usize) {
        self.lost_batches.fetch_add(1, Ordering::AcqRel);
        self.lost_records.fetch_add(records as u64, Ordering::AcqRel);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let total = if self.indeterminate.load(Ordering::Acquire) {
            None
        } else {
            Some(self.estimated_total.load(Ordering::Acquire))
        };
        ProgressSnapshot {
            total,
            completed: self.completed.load(Ordering::Acquire),
            added: self.added.load(Ordering::Acquire),
            removed: self.removed.load(Ordering::Acquire),
            overridden: self.overridden.load(Ordering::Acquire),
            lost_batches: self.lost_batches.load(Ordering::Acquire),
            lost_records: self.lost_records.load(Ordering::Acquire),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overshooting_the_estimate_goes_indeterminate() {
        let progress = Progress::new(Some(10));
        progress.reserve(8);
        progress.record_success(8, &WritePlan::default(), BulkAck::default());
        assert_eq!(progress.snapshot().total, Some(10));

        progress.reserve(5);
        assert_eq!(progress.snapshot().total, None);
        progress.reserve(1);
        assert_eq!(progress.snapshot().total, None);
    }

    #[test]
    fn reservations_in_flight_count_toward_the_estimate() {
        let progress = Progress::new(Some(10));
        progress.reserve(6);
        assert_eq!(progress.snapshot().total, Some(10));
        // Second lane starts before the first finishes.
        progress.reserve(6);
        assert_eq!(progress.snapshot().total, None);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let progress = Progress::new(None);
        let ack = BulkAck {
            indexed: 2,
            deleted: 1,
            not_found: 0,
        };
        let plan = WritePlan {
            ops: Vec::new(),
            overridden: 1,
        };
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..1_000 {
                        progress.reserve(3);
                        progress.record_success(3, &plan, ack);
                    }
                    progress.record_lost(5);
                });
            }
        });
        let snapshot = progress.snapshot();
        assert_eq!(snapshot.completed, 24_000);
        assert_eq!(snapshot.added, 16_000);
        assert_eq!(snapshot.removed, 8_000);
        assert_eq!(snapshot.overridden, 8_000);
        assert_eq!(snapshot.lost_batches, 8);
        assert_eq!(snapshot.lost_records, 40);
        assert_eq!(snapshot.total, None);
    }
}
