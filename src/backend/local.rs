//! In-process search engine with optional JSON persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SearchEngine;
use crate::search::EngineQuery;
use crate::types::{BulkAck, SyncError, SyncResult, WriteOp, WritePlan};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LocalIndex {
    settings: Value,
    documents: BTreeMap<u64, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct EngineState {
    indices: BTreeMap<String, LocalIndex>,
    aliases: BTreeMap<String, BTreeSet<String>>,
}

impl EngineState {
    /// Resolve a write target to exactly one concrete index.
    fn resolve_write(&self, target: &str) -> SyncResult<String> {
        if self.indices.contains_key(target) {
            return Ok(target.to_string());
        }
        match self.aliases.get(target) {
            Some(bound) if bound.len() == 1 => Ok(bound.iter().next().cloned().unwrap_or_default()),
            Some(bound) if bound.len() > 1 => Err(SyncError::BulkRejected {
                index: target.to_string(),
                reason: format!("alias is bound to {} indices", bound.len()),
            }),
            _ => Err(SyncError::IndexNotFound(target.to_string())),
        }
    }

    fn resolve_read(&self, target: &str) -> SyncResult<Vec<String>> {
        if self.indices.contains_key(target) {
            return Ok(vec![target.to_string()]);
        }
        match self.aliases.get(target) {
            Some(bound) if !bound.is_empty() => Ok(bound.iter().cloned().collect()),
            _ => Err(SyncError::IndexNotFound(target.to_string())),
        }
    }
}

/// A search engine living in this process.
///
/// Every operation takes one lock, so alias swaps are atomic with respect to
/// concurrent writers and readers. When opened from a file, creating,
/// swapping, and deleting indices are written through before they return;
/// bulk writes are persisted with the next structural change or `save`.
pub struct LocalEngine {
    state: Mutex<EngineState>,
    path: Option<PathBuf>,
}

impl LocalEngine {
    /// Create an empty, memory-only engine.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            path: None,
        }
    }

    /// Open an engine persisted at `path`, starting empty if it does not exist.
    pub fn open(path: &Path) -> SyncResult<Self> {
        let state = if path.exists() {
            let data = std::fs::read_to_string(path)?;
            serde_json::from_str(&data)?
        } else {
            EngineState::default()
        };
        Ok(Self {
            state: Mutex::new(state),
            path: Some(path.to_path_buf()),
        })
    }

    /// Write the current state back to the file it was opened from.
    pub fn save(&self) -> SyncResult<()> {
        self.persist(&self.state.lock())
    }

    /// Caller holds the state lock, so no change lands between encode and rename.
    fn persist(&self, state: &EngineState) -> SyncResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let data = serde_json::to_string(state)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Names of all concrete indices.
    pub fn indices(&self) -> Vec<String> {
        self.state.lock().indices.keys().cloned().collect()
    }

    /// Every alias and the indices bound to it.
    pub fn aliases(&self) -> BTreeMap<String, Vec<String>> {
        self.state
            .lock()
            .aliases
            .iter()
            .map(|(alias, bound)| (alias.clone(), bound.iter().cloned().collect()))
            .collect()
    }

    /// Look up one document through an index or alias.
    pub fn document(&self, target: &str, id: u64) -> Option<Value> {
        let state = self.state.lock();
        let name = state.resolve_write(target).ok()?;
        state.indices.get(&name)?.documents.get(&id).cloned()
    }

    /// Number of documents behind an index or alias.
    pub fn document_count(&self, target: &str) -> usize {
        let state = self.state.lock();
        state.resolve_read(target).map_or(0, |names| {
            names
                .iter()
                .filter_map(|n| state.indices.get(n))
                .map(|i| i.documents.len())
                .sum()
        })
    }
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchEngine for LocalEngine {
    fn create_index(&self, name: &str, settings: &Value) -> SyncResult<()> {
        let mut state = self.state.lock();
        if state.indices.contains_key(name) || state.aliases.contains_key(name) {
            return Err(SyncError::IndexExists(name.to_string()));
        }
        state.indices.insert(
            name.to_string(),
            LocalIndex {
                settings: settings.clone(),
                documents: BTreeMap::new(),
            },
        );
        if let Err(e) = self.persist(&state) {
            state.indices.remove(name);
            return Err(e);
        }
        log::debug!("Created index {}", name);
        Ok(())
    }

    fn bulk_write(&self, target: &str, plan: &WritePlan) -> SyncResult<BulkAck> {
        let mut state = self.state.lock();
        let name = state.resolve_write(target)?;
        let index = state
            .indices
            .get_mut(&name)
            .ok_or_else(|| SyncError::IndexNotFound(name.clone()))?;

        let mut ack = BulkAck::default();
        for op in &plan.ops {
            match op {
                WriteOp::Upsert { id, document } => {
                    index.documents.insert(*id, document.clone());
                    ack.indexed += 1;
                }
                WriteOp::Delete { id } => {
                    if index.documents.remove(id).is_some() {
                        ack.deleted += 1;
                    } else {
                        ack.not_found += 1;
                    }
                }
            }
        }
        Ok(ack)
    }

    fn list_aliases(&self, alias: &str) -> SyncResult<Vec<String>> {
        Ok(self
            .state
            .lock()
            .aliases
            .get(alias)
            .map(|bound| bound.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn swap_alias(&self, alias: &str, remove: &[String], add: &[String]) -> SyncResult<()> {
        let mut state = self.state.lock();
        let fail = |reason: String| SyncError::AliasSwap {
            alias: alias.to_string(),
            reason,
        };

        if state.indices.contains_key(alias) {
            return Err(fail("an index with the alias name exists".to_string()));
        }
        let bound = state.aliases.get(alias).cloned().unwrap_or_default();
        if let Some(missing) = remove.iter().find(|name| !bound.contains(*name)) {
            return Err(fail(format!("{} is not bound", missing)));
        }
        if let Some(missing) = add.iter().find(|name| !state.indices.contains_key(*name)) {
            return Err(fail(format!("index {} does not exist", missing)));
        }

        let entry = state.aliases.entry(alias.to_string()).or_default();
        for name in remove {
            entry.remove(name);
        }
        entry.extend(add.iter().cloned());
        if entry.is_empty() {
            state.aliases.remove(alias);
        }

        if let Err(e) = self.persist(&state) {
            if bound.is_empty() {
                state.aliases.remove(alias);
            } else {
                state.aliases.insert(alias.to_string(), bound);
            }
            return Err(fail(e.to_string()));
        }
        Ok(())
    }

    fn delete_index(&self, name: &str) -> SyncResult<()> {
        let mut state = self.state.lock();
        let Some(index) = state.indices.remove(name) else {
            return Err(SyncError::IndexNotFound(name.to_string()));
        };
        let aliases_before = state.aliases.clone();
        state.aliases.retain(|_, bound| {
            bound.remove(name);
            !bound.is_empty()
        });

        if let Err(e) = self.persist(&state) {
            state.indices.insert(name.to_string(), index);
            state.aliases = aliases_before;
            return Err(e);
        }
        log::debug!("Deleted index {}", name);
        Ok(())
    }

    fn query(&self, target: &str, query: &EngineQuery) -> SyncResult<Vec<Value>> {
        let state = self.state.lock();
        let names = state.resolve_read(target)?;

        let mut hits: Vec<(u64, &Value)> = names
            .iter()
            .filter_map(|n| state.indices.get(n))
            .flat_map(|index| index.documents.iter())
            .filter(|(_, doc)| query.matches(doc))
            .map(|(id, doc)| (*id, doc))
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(hits
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .map(|(_, doc)| doc.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn swap_is_all_or_nothing() {
        let engine = LocalEngine::new();
        engine.create_index("tags_1", &json!({})).unwrap();
        engine.swap_alias("tags", &[], &["tags_1".to_string()]).unwrap();

        let err = engine
            .swap_alias("tags", &["tags_1".to_string()], &["tags_2".to_string()])
            .unwrap_err();
        assert!(matches!(err, SyncError::AliasSwap { .. }));
        assert_eq!(engine.list_aliases("tags").unwrap(), vec!["tags_1".to_string()]);
    }

    #[test]
    fn deletes_report_missing_documents() {
        let engine = LocalEngine::new();
        engine.create_index("tags_1", &json!({})).unwrap();
        let plan = WritePlan {
            ops: vec![
                WriteOp::Upsert { id: 1, document: json!({"id": 1}) },
                WriteOp::Delete { id: 1 },
                WriteOp::Delete { id: 2 },
            ],
            overridden: 0,
        };
        let ack = engine.bulk_write("tags_1", &plan).unwrap();
        assert_eq!(ack, BulkAck { indexed: 1, deleted: 1, not_found: 1 });
    }

    #[test]
    fn structural_changes_are_written_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let engine = LocalEngine::open(&path).unwrap();
        engine.create_index("tags_1", &json!({})).unwrap();
        let plan = WritePlan {
            ops: vec![WriteOp::Upsert { id: 1, document: json!({"id": 1}) }],
            overridden: 0,
        };
        engine.bulk_write("tags_1", &plan).unwrap();
        engine.swap_alias("tags", &[], &["tags_1".to_string()]).unwrap();

        // No save(): the swap alone must have reached the file.
        let reopened = LocalEngine::open(&path).unwrap();
        assert_eq!(reopened.list_aliases("tags").unwrap(), vec!["tags_1".to_string()]);
        assert_eq!(reopened.document_count("tags"), 1);

        engine.create_index("tags_2", &json!({})).unwrap();
        engine
            .swap_alias("tags", &["tags_1".to_string()], &["tags_2".to_string()])
            .unwrap();
        engine.delete_index("tags_1").unwrap();
        let reopened = LocalEngine::open(&path).unwrap();
        assert_eq!(reopened.indices(), vec!["tags_2".to_string()]);
    }

    #[test]
    fn failed_write_through_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().join("state");
        std::fs::create_dir(&state_dir).unwrap();
        let engine = LocalEngine::open(&state_dir.join("engine.json")).unwrap();
        engine.create_index("tags_1", &json!({})).unwrap();

        std::fs::remove_dir_all(&state_dir).unwrap();
        let err = engine
            .swap_alias("tags", &[], &["tags_1".to_string()])
            .unwrap_err();
        assert!(matches!(err, SyncError::AliasSwap { .. }));
        assert!(engine.list_aliases("tags").unwrap().is_empty());

        assert!(engine.create_index("tags_2", &json!({})).is_err());
        assert_eq!(engine.indices(), vec!["tags_1".to_string()]);

        assert!(engine.delete_index("tags_1").is_err());
        assert_eq!(engine.indices(), vec!["tags_1".to_string()]);
    }

    #[test]
    fn state_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let engine = LocalEngine::open(&path).unwrap();
        engine.create_index("tags_1", &json!({})).unwrap();
        engine.swap_alias("tags", &[], &["tags_1".to_string()]).unwrap();
        engine.save().unwrap();

        let reopened = LocalEngine::open(&path).unwrap();
        assert_eq!(reopened.list_aliases("tags").unwrap(), vec!["tags_1".to_string()]);
    }
}
