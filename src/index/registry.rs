//! Static registry of every index this deployment knows how to build.

use serde_json::{json, Value};

use super::definition::IndexDefinition;
use crate::types::{EntityType, SyncError, SyncResult};

/// Maps each entity type to its index definition.
///
/// Definitions are ordered by the amount of data expected in each index so
/// that smaller indices go online sooner.
pub struct IndexRegistry {
    definitions: Vec<IndexDefinition>,
}

impl IndexRegistry {
    /// The built-in accounts, tags, and statuses indices.
    pub fn standard() -> Self {
        Self {
            definitions: vec![
                IndexDefinition::new(EntityType::Accounts, accounts_analysis(), accounts_mapping()),
                IndexDefinition::new(EntityType::Tags, tags_analysis(), tags_mapping()),
                IndexDefinition::new(EntityType::Statuses, statuses_analysis(), statuses_mapping()),
            ],
        }
    }

    pub fn get(&self, entity: EntityType) -> Option<&IndexDefinition> {
        self.definitions.iter().find(|d| d.entity() == entity)
    }

    pub fn all(&self) -> Vec<&IndexDefinition> {
        self.definitions.iter().collect()
    }

    /// Resolve an `--only` filter into definitions, keeping registry order.
    ///
    /// An empty filter selects every index; an unknown name is rejected.
    pub fn select(&self, only: &[String]) -> SyncResult<Vec<&IndexDefinition>> {
        if only.is_empty() {
            return Ok(self.all());
        }
        let mut wanted = Vec::with_capacity(only.len());
        for name in only {
            let entity =
                EntityType::from_name(name).ok_or_else(|| SyncError::UnknownIndex(name.clone()))?;
            let def = self
                .get(entity)
                .ok_or_else(|| SyncError::UnknownIndex(name.clone()))?;
            wanted.push(def.entity());
        }
        Ok(self
            .definitions
            .iter()
            .filter(|d| wanted.contains(&d.entity()))
            .collect())
    }
}

fn accounts_analysis() -> Value {
    json!({
        "filter": {
            "edge_ngram": { "type": "edge_ngram", "min_gram": 1, "max_gram": 15 }
        },
        "analyzer": {
            "content": {
                "tokenizer": "whitespace",
                "filter": ["lowercase", "asciifolding", "cjk_width"]
            },
            "edge_ngram": {
                "tokenizer": "standard",
                "filter": ["lowercase", "asciifolding", "cjk_width", "edge_ngram"]
            }
        }
    })
}

fn accounts_mapping() -> Value {
    json!({
        "id": { "type": "long" },
        "acct": { "type": "text", "analyzer": "edge_ngram", "search_analyzer": "content" },
        "display_name": { "type": "text", "analyzer": "edge_ngram", "search_analyzer": "content" },
        "text": { "type": "text", "analyzer": "content" },
        "discoverable": { "type": "boolean" }
    })
}

fn tags_analysis() -> Value {
    json!({
        "analyzer": {
            "content": {
                "tokenizer": "keyword",
                "filter": ["keyword_repeat", "lowercase", "asciifolding", "cjk_width"]
            },
            "edge_ngram": {
                "tokenizer": "edge_ngram",
                "filter": ["lowercase", "asciifolding", "cjk_width"]
            }
        },
        "tokenizer": {
            "edge_ngram": { "type": "edge_ngram", "min_gram": 2, "max_gram": 15 }
        }
    })
}

fn tags_mapping() -> Value {
    json!({
        "id": { "type": "long" },
        "name": { "type": "text", "analyzer": "content", "fields": {
            "edge_ngram": { "type": "text", "analyzer": "edge_ngram", "search_analyzer": "content" }
        }},
        "usable": { "type": "boolean" }
    })
}

fn statuses_analysis() -> Value {
    json!({
        "filter": {
            "custom_synonym": {
                "type": "synonym",
                "synonyms_path": "/etc/elasticsearch/synonym.txt"
            }
        },
        "tokenizer": {
            "ja_tokenizer": {
                "type": "kuromoji_tokenizer",
                "mode": "search",
                "user_dictionary": "/etc/elasticsearch/userdict_ja.txt"
            }
        },
        "analyzer": {
            "content": {
                "tokenizer": "ja_tokenizer",
                "type": "custom",
                "char_filter": ["icu_normalizer"],
                "filter": ["kuromoji_stemmer", "kuromoji_part_of_speech", "ja_stop", "custom_synonym"]
            },
            "ja_default_analyzer": { "tokenizer": "kuromoji_tokenizer" }
        }
    })
}

fn statuses_mapping() -> Value {
    json!({
        "date_detection": false,
        "properties": {
            "id": { "type": "long" },
            "account_id": { "type": "long" },
            "account_domain": { "type": "keyword" },
            "text": { "type": "text", "analyzer": "ja_default_analyzer", "fields": {
                "stemmed": { "type": "text", "analyzer": "content" }
            }},
            "tags": { "type": "text", "analyzer": "content" },
            "searchable_by": { "type": "long" },
            "language": { "type": "keyword" },
            "properties": { "type": "keyword" },
            "visibility": { "type": "keyword" },
            "created_at": { "type": "date" }
        }
    })
}
