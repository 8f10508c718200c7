//! Index definitions and schema drift detection.

use serde_json::{Map, Value};

use super::fingerprint_store::FingerprintStore;
use crate::types::{EntityType, SyncResult};

/// One logical index: its entity type, analysis settings, and field mapping.
///
/// Built once at startup and never mutated during a run.
#[derive(Debug, Clone)]
pub struct IndexDefinition {
    entity: EntityType,
    analysis: Value,
    mapping: Value,
    fingerprint: String,
}

impl IndexDefinition {
    /// Create a definition and compute its fingerprint.
    pub fn new(entity: EntityType, analysis: Value, mapping: Value) -> Self {
        let fingerprint = fingerprint_of(&analysis, &mapping);
        Self {
            entity,
            analysis,
            mapping,
            fingerprint,
        }
    }

    pub fn entity(&self) -> EntityType {
        self.entity
    }

    /// Stable name queries are issued against.
    pub fn logical_name(&self) -> &'static str {
        self.entity.name()
    }

    pub fn analysis(&self) -> &Value {
        &self.analysis
    }

    pub fn mapping(&self) -> &Value {
        &self.mapping
    }

    /// Settings body sent when creating a versioned instance.
    pub fn settings(&self) -> Value {
        serde_json::json!({
            "analysis": self.analysis,
            "mappings": self.mapping,
        })
    }

    /// Hex digest of the canonical analysis and mapping configuration.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Whether the deployed schema differs from this definition.
    ///
    /// A missing live fingerprint counts as changed.
    pub fn changed(&self, store: &dyn FingerprintStore) -> SyncResult<bool> {
        let live = store.get(self.logical_name())?;
        Ok(live.as_deref() != Some(self.fingerprint.as_str()))
    }

    /// Record this definition's fingerprint as the live one.
    pub fn lock(&self, store: &dyn FingerprintStore) -> SyncResult<()> {
        store.set(self.logical_name(), &self.fingerprint)
    }
}

/// blake3 over the canonical JSON encoding of both documents.
fn fingerprint_of(analysis: &Value, mapping: &Value) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(canonical_json(analysis).as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical_json(mapping).as_bytes());
    hex::encode(hasher.finalize().as_bytes())
}

/// Serialize with object keys sorted at every level.
///
/// Independent of whether `serde_json` was built with `preserve_order`.
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::fingerprint_store::MemoryFingerprintStore;
    use serde_json::json;

    #[test]
    fn fingerprint_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": {"y": [1, 2], "x": "z"}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": {"x": "z", "y": [1, 2]}, "b": 1}"#).unwrap();
        let da = IndexDefinition::new(EntityType::Tags, a, json!({}));
        let db = IndexDefinition::new(EntityType::Tags, b, json!({}));
        assert_eq!(da.fingerprint(), db.fingerprint());
    }

    #[test]
    fn fingerprint_tracks_array_order_and_values() {
        let da = IndexDefinition::new(EntityType::Tags, json!({"f": [1, 2]}), json!({}));
        let db = IndexDefinition::new(EntityType::Tags, json!({"f": [2, 1]}), json!({}));
        assert_ne!(da.fingerprint(), db.fingerprint());
    }

    #[test]
    fn changed_until_locked() {
        let store = MemoryFingerprintStore::new();
        let def = IndexDefinition::new(EntityType::Tags, json!({"k": 1}), json!({}));
        assert!(def.changed(&store).unwrap());

        def.lock(&store).unwrap();
        assert!(!def.changed(&store).unwrap());
        def.lock(&store).unwrap();
        assert!(!def.changed(&store).unwrap());

        let drifted = IndexDefinition::new(EntityType::Tags, json!({"k": 2}), json!({}));
        assert!(drifted.changed(&store).unwrap());
    }
}
