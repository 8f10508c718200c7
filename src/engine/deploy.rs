//! Deployment coordinator: versioning, concurrent import, and cut-over.

use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::alias::promote;
use super::progress::{Progress, ProgressSnapshot};
use super::transform::BatchTransformer;
use crate::backend::SearchEngine;
use crate::index::{FingerprintStore, IndexDefinition, VersionedIndex};
use crate::source::{pages, RecordSource};
use crate::types::{
    now_millis, Record, SyncError, SyncResult, DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY,
};

/// What to do when the engine rejects a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Log the error, count the slice as lost, and keep going.
    #[default]
    BestEffort,
    /// Finish the current page, then abort without swapping any alias.
    FailFast,
}

/// Tuning for one deploy run.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Worker pool size.
    pub concurrency: usize,
    /// Records fetched per source page.
    pub batch_size: usize,
    /// Pause a lane takes after each accepted bulk write.
    pub backoff: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            batch_size: DEFAULT_BATCH_SIZE,
            backoff: Duration::from_secs(1),
            failure_policy: FailurePolicy::BestEffort,
        }
    }
}

impl DeployOptions {
    /// Reject settings that make the run meaningless.
    pub fn validate(&self) -> SyncResult<()> {
        if self.concurrency < 1 {
            return Err(SyncError::InvalidConcurrency(self.concurrency));
        }
        if self.batch_size < 1 {
            return Err(SyncError::InvalidBatchSize(self.batch_size));
        }
        Ok(())
    }

    /// Records per unit of work: `ceil(batch_size / concurrency)`.
    pub fn slice_size(&self) -> usize {
        self.batch_size.div_ceil(self.concurrency).max(1)
    }
}

/// Where an index's run stopped short of promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureStage {
    /// The source failed while the index was being populated.
    Import,
    /// The alias swap or fingerprint lock failed.
    CutOver,
}

/// Per-index result of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexOutcome {
    pub name: String,
    /// Versioned instance created this run, if the schema drifted.
    pub version: Option<String>,
    /// Whether the alias now points at `version`.
    pub swapped: bool,
    /// Versions removed from the alias.
    pub superseded: Vec<String>,
    /// Superseded versions the engine refused to delete.
    pub orphaned: Vec<String>,
    /// Import or swap failure that left this index unpromoted.
    pub error: Option<String>,
    pub failed_at: Option<FailureStage>,
}

impl IndexOutcome {
    /// The failure as a typed error, if there was one.
    pub fn to_error(&self) -> Option<SyncError> {
        let reason = self.error.clone()?;
        Some(match self.failed_at {
            Some(FailureStage::Import) => SyncError::ImportFailed {
                index: self.name.clone(),
                reason,
            },
            _ => SyncError::AliasSwap {
                alias: self.name.clone(),
                reason,
            },
        })
    }
}

/// Aggregate result of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeployReport {
    pub suffix: u64,
    pub progress: ProgressSnapshot,
    pub indices: Vec<IndexOutcome>,
}

impl DeployReport {
    pub fn added(&self) -> u64 {
        self.progress.added
    }

    pub fn removed(&self) -> u64 {
        self.progress.removed
    }

    /// Indices whose import or cut-over failed.
    pub fn failures(&self) -> Vec<&IndexOutcome> {
        self.indices.iter().filter(|o| o.error.is_some()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.indices.iter().all(|o| o.error.is_none())
    }

    /// The first per-index failure, typed by the stage it happened in.
    pub fn first_error(&self) -> Option<SyncError> {
        self.indices.iter().find_map(IndexOutcome::to_error)
    }
}

type Observer<'a> = Box<dyn Fn(&str, &ProgressSnapshot) + Send + Sync + 'a>;

/// Drives a deploy run against one engine and one record source.
///
/// Concurrent runs for the same logical index are not supported; callers
/// must serialize them.
pub struct Deployer<'a> {
    engine: &'a dyn SearchEngine,
    source: &'a dyn RecordSource,
    fingerprints: &'a dyn FingerprintStore,
    options: DeployOptions,
    transformer: BatchTransformer,
    suffix: Option<u64>,
    observer: Option<Observer<'a>>,
}

struct IndexRun<'d> {
    definition: &'d IndexDefinition,
    version: Option<VersionedIndex>,
    import_error: Option<String>,
}

impl IndexRun<'_> {
    fn target(&self) -> String {
        match &self.version {
            Some(version) => version.name(),
            None => self.definition.logical_name().to_string(),
        }
    }
}

impl<'a> Deployer<'a> {
    pub fn new(
        engine: &'a dyn SearchEngine,
        source: &'a dyn RecordSource,
        fingerprints: &'a dyn FingerprintStore,
        options: DeployOptions,
    ) -> Self {
        Self {
            engine,
            source,
            fingerprints,
            options,
            transformer: BatchTransformer::new(),
            suffix: None,
            observer: None,
        }
    }

    /// Use a fixed version suffix instead of the current time.
    pub fn with_suffix(mut self, suffix: u64) -> Self {
        self.suffix = Some(suffix);
        self
    }

    /// Receive a snapshot after every page, tagged with the index name.
    pub fn on_progress(mut self, observer: impl Fn(&str, &ProgressSnapshot) + Send + Sync + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Create drifted versions, import every index, then cut over.
    ///
    /// Only configuration problems, version creation failures, and fail-fast
    /// aborts return `Err`; everything else is reported per index.
    pub fn deploy(&self, indices: &[&IndexDefinition]) -> SyncResult<DeployReport> {
        self.options.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.concurrency)
            .thread_name(|i| format!("deploy-worker-{}", i))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to start worker pool: {}", e)))?;

        let suffix = self.suffix.unwrap_or_else(now_millis);
        let mut runs = self.prepare_versions(indices, suffix)?;

        let progress = Progress::new(self.estimate(indices));
        for run in &mut runs {
            self.import(&pool, run, &progress)?;
        }

        let snapshot = progress.snapshot();
        log::info!(
            "Indexed {} records, de-indexed {}",
            snapshot.added,
            snapshot.removed
        );

        let outcomes = runs.into_iter().map(|run| self.finalize(run)).collect();
        Ok(DeployReport {
            suffix,
            progress: progress.snapshot(),
            indices: outcomes,
        })
    }

    /// Create an unaliased version for every drifted index before importing.
    ///
    /// An alias bound to nothing counts as drift even when the fingerprint is
    /// locked, so a lost cut-over is rebuilt instead of written into a void.
    fn prepare_versions<'d>(
        &self,
        indices: &[&'d IndexDefinition],
        suffix: u64,
    ) -> SyncResult<Vec<IndexRun<'d>>> {
        let mut runs = Vec::with_capacity(indices.len());
        for &definition in indices {
            let name = definition.logical_name();
            let drifted = definition.changed(self.fingerprints)?;
            let unbound = self.engine.list_aliases(name)?.is_empty();
            if unbound && !drifted {
                log::warn!("{} has a locked fingerprint but no bound version, rebuilding", name);
            }
            let version = if drifted || unbound {
                let version = VersionedIndex::new(definition.logical_name(), suffix);
                self.engine
                    .create_index(&version.name(), &definition.settings())?;
                log::info!(
                    "Schema of {} changed, created {}",
                    name,
                    version.name()
                );
                Some(version)
            } else {
                None
            };
            runs.push(IndexRun {
                definition,
                version,
                import_error: None,
            });
        }
        Ok(runs)
    }

    fn estimate(&self, indices: &[&IndexDefinition]) -> Option<u64> {
        indices
            .iter()
            .map(|d| self.source.estimate_count(d.entity()))
            .sum()
    }

    fn import(
        &self,
        pool: &rayon::ThreadPool,
        run: &mut IndexRun<'_>,
        progress: &Progress,
    ) -> SyncResult<()> {
        let name = run.definition.logical_name();
        let target = run.target();
        let slice_size = self.options.slice_size();
        let first_error: Mutex<Option<SyncError>> = Mutex::new(None);
        log::info!("Importing {} into {}", name, target);

        for page in pages(self.source, run.definition.entity(), self.options.batch_size) {
            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    log::error!("Error reading {} from source: {}", name, e);
                    run.import_error = Some(e.to_string());
                    break;
                }
            };

            pool.scope(|scope| {
                for slice in page.chunks(slice_size) {
                    let target = target.as_str();
                    let first_error = &first_error;
                    scope.spawn(move |_| self.run_unit(name, target, slice, progress, first_error));
                }
            });

            if let Some(observer) = &self.observer {
                observer(name, &progress.snapshot());
            }

            if let Some(e) = first_error.lock().take() {
                return Err(e);
            }
        }
        Ok(())
    }

    /// One unit of work: plan, write, count, then back off.
    fn run_unit(
        &self,
        index: &str,
        target: &str,
        records: &[Record],
        progress: &Progress,
        first_error: &Mutex<Option<SyncError>>,
    ) {
        progress.reserve(records.len());
        let plan = self.transformer.transform(records);
        log::debug!(
            "{}: {} upserts, {} deletes into {}",
            index,
            plan.upserts(),
            plan.deletes(),
            target
        );

        match self.engine.bulk_write(target, &plan) {
            Ok(ack) => {
                progress.record_success(records.len(), &plan, ack);
                if !self.options.backoff.is_zero() {
                    thread::sleep(self.options.backoff);
                }
            }
            Err(e) => {
                log::error!("Error importing {}: {}", index, e);
                progress.record_lost(records.len());
                if self.options.failure_policy == FailurePolicy::FailFast {
                    first_error.lock().get_or_insert(e);
                }
            }
        }
    }

    fn finalize(&self, run: IndexRun<'_>) -> IndexOutcome {
        let name = run.definition.logical_name().to_string();
        let Some(version) = run.version else {
            return IndexOutcome {
                name,
                failed_at: run.import_error.as_ref().map(|_| FailureStage::Import),
                error: run.import_error,
                ..Default::default()
            };
        };
        let version_name = version.name();

        if let Some(error) = run.import_error {
            log::error!(
                "Not promoting {}: import did not finish ({})",
                version_name,
                error
            );
            return IndexOutcome {
                name,
                version: Some(version_name),
                error: Some(error),
                failed_at: Some(FailureStage::Import),
                ..Default::default()
            };
        }

        match promote(self.engine, self.fingerprints, run.definition, &version_name) {
            Ok(promotion) => IndexOutcome {
                name,
                version: Some(version_name),
                swapped: true,
                superseded: promotion.superseded,
                orphaned: promotion.orphaned,
                error: None,
                failed_at: None,
            },
            Err(e) => {
                log::error!("Cut-over of {} failed: {}", name, e);
                IndexOutcome {
                    name,
                    version: Some(version_name),
                    error: Some(e.to_string()),
                    failed_at: Some(FailureStage::CutOver),
                    ..Default::default()
                }
            }
        }
    }
}
