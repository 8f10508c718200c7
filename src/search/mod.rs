//! Read path: query translation, retrieval, and visibility filtering.

pub mod filter;
pub mod query;

pub use filter::{MemoryRelationships, RelationshipSnapshot, RelationshipSource};
pub use query::{normalize, parse, AuthorFilter, EngineQuery, ParsedQuery, SearchRequest};

use serde::Serialize;
use serde_json::Value;

use crate::backend::SearchEngine;
use crate::index::build_document;
use crate::source::{pages, RecordSource};
use crate::types::{Account, EntityType, Record, SyncError, SyncResult};

/// Page size used when scanning the source as a fallback.
const FALLBACK_PAGE_SIZE: usize = 500;

/// Account lookups needed to translate `account_id` and `from:`.
pub trait AccountDirectory: Send + Sync {
    fn account(&self, id: u64) -> Option<Account>;

    /// Find an account by `user` or `user@domain`, case-insensitively.
    fn find_by_acct(&self, acct: &str) -> Option<Account>;
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: u64,
    pub account_id: u64,
    pub account_domain: Option<String>,
    pub document: Value,
}

impl SearchHit {
    fn from_document(document: Value) -> Option<Self> {
        Some(Self {
            id: document["id"].as_u64()?,
            account_id: document["account_id"].as_u64()?,
            account_domain: document["account_domain"].as_str().map(str::to_string),
            document,
        })
    }
}

/// Where candidates came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Engine,
    Fallback,
}

/// Results of one search, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub backend: Backend,
    pub hits: Vec<SearchHit>,
}

/// Status search over the engine with a relational fallback.
pub struct StatusSearch<'a> {
    engine: Option<&'a dyn SearchEngine>,
    source: &'a dyn RecordSource,
    directory: &'a dyn AccountDirectory,
    relationships: &'a dyn RelationshipSource,
}

impl<'a> StatusSearch<'a> {
    pub fn new(
        source: &'a dyn RecordSource,
        directory: &'a dyn AccountDirectory,
        relationships: &'a dyn RelationshipSource,
    ) -> Self {
        Self {
            engine: None,
            source,
            directory,
            relationships,
        }
    }

    /// Prefer this engine; the source is scanned only when it is unreachable.
    pub fn with_engine(mut self, engine: &'a dyn SearchEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Run a search for `request.viewer`.
    pub fn search(&self, request: &SearchRequest) -> SyncResult<SearchResults> {
        let query = normalize(request, self.directory)?;
        let parsed = parse(&query)?;
        if parsed.is_empty() || request.limit == 0 {
            return Ok(SearchResults {
                query,
                backend: Backend::Fallback,
                hits: Vec::new(),
            });
        }

        let lowered = EngineQuery::lower(
            parsed,
            self.directory,
            request.viewer,
            request.limit,
            request.offset,
        );
        let (backend, mut hits) = self.retrieve(&lowered)?;

        let mut account_ids: Vec<u64> = hits.iter().map(|h| h.account_id).collect();
        account_ids.sort_unstable();
        account_ids.dedup();
        let mut domains: Vec<String> = hits.iter().filter_map(|h| h.account_domain.clone()).collect();
        domains.sort();
        domains.dedup();

        let snapshot = self
            .relationships
            .relations_map(request.viewer, &account_ids, &domains)?;
        hits.retain(|hit| !snapshot.filtered(hit));

        Ok(SearchResults {
            query,
            backend,
            hits,
        })
    }

    fn retrieve(&self, query: &EngineQuery) -> SyncResult<(Backend, Vec<SearchHit>)> {
        if let Some(engine) = self.engine {
            match engine.query(EntityType::Statuses.name(), query) {
                Ok(docs) => {
                    let hits = docs.into_iter().filter_map(SearchHit::from_document).collect();
                    return Ok((Backend::Engine, hits));
                }
                Err(e @ (SyncError::Unavailable(_) | SyncError::IndexNotFound(_))) => {
                    log::warn!("Search engine unusable, falling back to database: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok((Backend::Fallback, self.scan_source(query)?))
    }

    /// Evaluate the query over the same documents the index would hold.
    fn scan_source(&self, query: &EngineQuery) -> SyncResult<Vec<SearchHit>> {
        let mut hits = Vec::new();
        for page in pages(self.source, EntityType::Statuses, FALLBACK_PAGE_SIZE) {
            for record in page? {
                let Record::Status(status) = &record else {
                    continue;
                };
                if status.eligible_audience().is_empty() {
                    continue;
                }
                let document = build_document(&record);
                if query.matches(&document) {
                    hits.extend(SearchHit::from_document(document));
                }
            }
        }
        hits.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(hits
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }
}
