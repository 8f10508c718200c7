//! Promotion of a populated version to its logical alias.

use crate::backend::SearchEngine;
use crate::index::{FingerprintStore, IndexDefinition};
use crate::types::{SyncError, SyncResult};

/// What a successful promotion changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Promotion {
    /// Versions that were bound before and are now unbound.
    pub superseded: Vec<String>,
    /// Superseded versions that could not be deleted and remain as orphans.
    pub orphaned: Vec<String>,
}

/// Bind `new_version` to the definition's alias, drop older versions, and
/// lock the fingerprint.
///
/// Ordering is data, then alias, then deletion: a crash between the swap and
/// the deletes leaves only unaliased old versions behind. The fingerprint is
/// never locked unless the swap succeeded.
pub fn promote(
    engine: &dyn SearchEngine,
    fingerprints: &dyn FingerprintStore,
    definition: &IndexDefinition,
    new_version: &str,
) -> SyncResult<Promotion> {
    let alias = definition.logical_name();
    let swap_error = |e: SyncError| match e {
        e @ SyncError::AliasSwap { .. } => e,
        other => SyncError::AliasSwap {
            alias: alias.to_string(),
            reason: other.to_string(),
        },
    };

    let superseded: Vec<String> = engine
        .list_aliases(alias)
        .map_err(swap_error)?
        .into_iter()
        .filter(|name| name != new_version)
        .collect();

    engine
        .swap_alias(alias, &superseded, &[new_version.to_string()])
        .map_err(swap_error)?;
    log::info!(
        "Alias {} now points at {} (was {:?})",
        alias,
        new_version,
        superseded
    );

    let mut orphaned = Vec::new();
    for old in &superseded {
        if let Err(e) = engine.delete_index(old) {
            log::warn!("Could not delete superseded index {}: {}", old, e);
            orphaned.push(old.clone());
        }
    }

    definition.lock(fingerprints)?;
    Ok(Promotion {
        superseded,
        orphaned,
    })
}
