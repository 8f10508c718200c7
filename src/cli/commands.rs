//! CLI command implementations.

use std::io::Write;

use crate::backend::{LocalEngine, SearchEngine};
use crate::config::DeployConfig;
use crate::engine::{DeployLock, DeployReport, Deployer, ProgressSnapshot};
use crate::index::{
    parse_versioned_name, FileFingerprintStore, FingerprintStore, IndexRegistry, VersionedIndex,
};
use crate::search::{MemoryRelationships, SearchRequest, StatusSearch};
use crate::source::{Dataset, MemoryRecordSource};
use crate::types::SyncResult;

/// Create or upgrade indices and populate them from the dataset.
///
/// Numeric options are validated before anything is opened. The run holds
/// the engine's lock file until it returns.
pub fn cmd_deploy(config: &DeployConfig, only: &[String], json: bool) -> SyncResult<()> {
    let options = config.deploy_options();
    options.validate()?;
    let registry = IndexRegistry::standard();
    let indices = registry.select(only)?;

    let dataset = Dataset::read_from_file(&config.dataset_path)?;
    let _lock = DeployLock::acquire(&config.lock_path(), config.lock_timeout())?;
    let source = MemoryRecordSource::from_dataset(&dataset);
    let engine = LocalEngine::open(&config.engine_path)?;
    let fingerprints = FileFingerprintStore::new(&config.fingerprints_path);

    let deployer = Deployer::new(&engine, &source, &fingerprints, options).on_progress(
        move |name, snapshot| {
            if !json {
                print_progress(name, snapshot);
            }
        },
    );
    let result = deployer.deploy(&indices);
    // Whatever was written stays written, even when the run aborted.
    let report = settle(result, engine.save())?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_default()
        );
    } else {
        eprintln!();
        print_summary(&report);
    }

    match report.first_error() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// A failed run reports its own error; a failed save only surfaces after a
/// run that succeeded.
fn settle(result: SyncResult<DeployReport>, saved: SyncResult<()>) -> SyncResult<DeployReport> {
    match result {
        Ok(report) => {
            saved?;
            Ok(report)
        }
        Err(e) => {
            if let Err(save_error) = saved {
                log::error!("Could not save engine state: {}", save_error);
            }
            Err(e)
        }
    }
}

fn print_progress(name: &str, snapshot: &ProgressSnapshot) {
    let total = snapshot
        .total
        .map_or_else(|| "?".to_string(), |t| t.to_string());
    eprint!(
        "\rImporting {} {}/{} (added {}, removed {}, lost {})",
        name,
        snapshot.completed,
        total,
        snapshot.added,
        snapshot.removed,
        snapshot.lost_records
    );
    let _ = std::io::stderr().flush();
}

fn print_summary(report: &DeployReport) {
    let progress = &report.progress;
    println!(
        "Indexed {} records, de-indexed {}",
        progress.added, progress.removed
    );
    if progress.overridden > 0 {
        println!(
            "  {} records hidden because nobody may search for them",
            progress.overridden
        );
    }
    if progress.lost_batches > 0 {
        println!(
            "  {} batches ({} records) failed and were skipped",
            progress.lost_batches, progress.lost_records
        );
    }
    for outcome in &report.indices {
        match (&outcome.version, outcome.swapped, &outcome.error) {
            (_, _, Some(error)) => println!("  {}: FAILED ({})", outcome.name, error),
            (Some(version), true, None) => {
                println!("  {}: now served by {}", outcome.name, version)
            }
            _ => println!("  {}: schema unchanged", outcome.name),
        }
    }
}

/// Search statuses as a viewer.
pub fn cmd_search(
    config: &DeployConfig,
    request: &SearchRequest,
    use_engine: bool,
    json: bool,
) -> SyncResult<()> {
    let dataset = Dataset::read_from_file(&config.dataset_path)?;
    let source = MemoryRecordSource::from_dataset(&dataset);
    let relationships = MemoryRelationships::from_dataset(&dataset);

    let engine;
    let mut search = StatusSearch::new(&source, &source, &relationships);
    if use_engine && config.engine_path.exists() {
        engine = LocalEngine::open(&config.engine_path)?;
        search = search.with_engine(&engine);
    }
    let results = search.search(request)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&results).unwrap_or_default()
        );
    } else {
        println!("Query: {}", results.query);
        println!("Backend: {:?}", results.backend);
        for hit in &results.hits {
            let text = hit.document["text"].as_str().unwrap_or_default();
            println!("  {} (account {}): {:?}", hit.id, hit.account_id, text);
        }
        println!("{} results", results.hits.len());
    }
    Ok(())
}

/// Show alias bindings and schema drift for every index.
pub fn cmd_status(config: &DeployConfig, json: bool) -> SyncResult<()> {
    let registry = IndexRegistry::standard();
    let engine = LocalEngine::open(&config.engine_path)?;
    let fingerprints = FileFingerprintStore::new(&config.fingerprints_path);

    let existing = engine.indices();
    let mut rows = Vec::new();
    for definition in registry.all() {
        let name = definition.logical_name();
        let bound = engine.list_aliases(name)?;
        let versions: Vec<serde_json::Value> = existing
            .iter()
            .filter_map(|index| parse_versioned_name(index))
            .filter(|(logical, _)| *logical == name)
            .map(|(logical, suffix)| {
                let mut version = VersionedIndex::new(logical, suffix);
                version.alias_bound = bound.contains(&version.name());
                serde_json::json!({
                    "name": version.name(),
                    "suffix": version.suffix,
                    "alias_bound": version.alias_bound,
                })
            })
            .collect();
        rows.push(serde_json::json!({
            "index": name,
            "bound_to": bound,
            "versions": versions,
            "documents": engine.document_count(name),
            "live_fingerprint": fingerprints.get(name)?,
            "fingerprint": definition.fingerprint(),
            "changed": definition.changed(&fingerprints)?,
        }));
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).unwrap_or_default()
        );
    } else {
        for row in &rows {
            let bound: Vec<&str> = row["bound_to"]
                .as_array()
                .map(|b| b.iter().filter_map(|v| v.as_str()).collect())
                .unwrap_or_default();
            println!(
                "{}: {} ({} documents){}",
                row["index"].as_str().unwrap_or_default(),
                if bound.is_empty() {
                    "not deployed".to_string()
                } else {
                    bound.join(", ")
                },
                row["documents"],
                if row["changed"].as_bool() == Some(true) {
                    ", schema changed"
                } else {
                    ""
                }
            );
            let orphans: Vec<&str> = row["versions"]
                .as_array()
                .map(|versions| {
                    versions
                        .iter()
                        .filter(|v| v["alias_bound"] == false)
                        .filter_map(|v| v["name"].as_str())
                        .collect()
                })
                .unwrap_or_default();
            if !orphans.is_empty() {
                println!("  unaliased: {}", orphans.join(", "));
            }
        }
    }
    Ok(())
}
