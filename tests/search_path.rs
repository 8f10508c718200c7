//! Search path tests: query normalization, retrieval, fallback, post-filtering.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::Value;

use search_deploy::backend::{LocalEngine, SearchEngine};
use search_deploy::engine::{DeployOptions, Deployer, FailurePolicy};
use search_deploy::index::{IndexRegistry, MemoryFingerprintStore};
use search_deploy::search::{
    normalize, parse, Backend, EngineQuery, MemoryRelationships, SearchRequest, StatusSearch,
};
use search_deploy::source::MemoryRecordSource;
use search_deploy::types::{
    format_timestamp, time_to_snowflake, Account, BulkAck, Record, Status, SyncError, SyncResult,
    Visibility, WritePlan,
};

// ==================== Helpers ====================

fn account(id: u64, username: &str, domain: Option<&str>) -> Account {
    Account {
        id,
        username: username.to_string(),
        domain: domain.map(str::to_string),
        display_name: String::new(),
        note: String::new(),
        discoverable: true,
        suspended: false,
    }
}

/// Snowflake id for `minute` minutes past 2024-03-01 09:00 UTC.
fn id_at(minute: u32) -> u64 {
    time_to_snowflake(Utc.with_ymd_and_hms(2024, 3, 1, 9, minute, 0).unwrap())
}

fn status(minute: u32, account_id: u64, text: &str) -> Status {
    Status {
        id: id_at(minute),
        account_id,
        text: text.to_string(),
        ..Default::default()
    }
}

/// Local: 1 viewer, 2 alice, 5 dave, 6 erin. Remote: 3 bob@remote.example.
fn populated_source() -> MemoryRecordSource {
    let source = MemoryRecordSource::new();
    source.insert(Record::Account(account(1, "viewer", None)));
    source.insert(Record::Account(account(2, "alice", None)));
    source.insert(Record::Account(account(3, "bob", Some("remote.example"))));
    source.insert(Record::Account(account(5, "dave", None)));
    source.insert(Record::Account(account(6, "erin", None)));

    source.insert(Record::Status(status(1, 2, "my cat sleeps")));
    source.insert(Record::Status(Status {
        account_domain: Some("remote.example".to_string()),
        bookmarked_by: vec![6],
        ..status(2, 3, "a remote cat")
    }));
    source.insert(Record::Status(Status {
        visibility: Visibility::Private,
        mentioned: vec![1],
        ..status(3, 5, "secret cat for viewer")
    }));
    source.insert(Record::Status(Status {
        visibility: Visibility::Direct,
        ..status(4, 5, "cat only dave knows")
    }));
    source.insert(Record::Status(Status {
        has_media: true,
        language: Some("en".to_string()),
        ..status(5, 6, "cat picture")
    }));
    source.insert(Record::Status(status(6, 2, "no felines here")));
    source
}

fn deployed_engine(source: &MemoryRecordSource) -> LocalEngine {
    let engine = LocalEngine::new();
    let fingerprints = MemoryFingerprintStore::new();
    let registry = IndexRegistry::standard();
    let options = DeployOptions {
        concurrency: 2,
        batch_size: 50,
        backoff: Duration::ZERO,
        failure_policy: FailurePolicy::BestEffort,
    };
    Deployer::new(&engine, source, &fingerprints, options)
        .deploy(&registry.all())
        .unwrap();
    engine
}

fn hit_ids(search: &StatusSearch<'_>, request: &SearchRequest) -> Vec<u64> {
    search
        .search(request)
        .unwrap()
        .hits
        .iter()
        .map(|h| h.id)
        .collect()
}

/// Engine that is always unreachable.
struct DownEngine;

impl SearchEngine for DownEngine {
    fn create_index(&self, _name: &str, _settings: &Value) -> SyncResult<()> {
        Err(SyncError::Unavailable("connection refused".to_string()))
    }

    fn bulk_write(&self, _target: &str, _plan: &WritePlan) -> SyncResult<BulkAck> {
        Err(SyncError::Unavailable("connection refused".to_string()))
    }

    fn list_aliases(&self, _alias: &str) -> SyncResult<Vec<String>> {
        Err(SyncError::Unavailable("connection refused".to_string()))
    }

    fn swap_alias(&self, _alias: &str, _remove: &[String], _add: &[String]) -> SyncResult<()> {
        Err(SyncError::Unavailable("connection refused".to_string()))
    }

    fn delete_index(&self, _name: &str) -> SyncResult<()> {
        Err(SyncError::Unavailable("connection refused".to_string()))
    }

    fn query(&self, _target: &str, _query: &EngineQuery) -> SyncResult<Vec<Value>> {
        Err(SyncError::Unavailable("connection refused".to_string()))
    }
}

// ==================== Normalization ====================

#[test]
fn test_legacy_filters_normalize_to_operators() {
    let source = populated_source();
    let min_time = Utc.with_ymd_and_hms(2024, 3, 1, 9, 2, 0).unwrap();
    let request = SearchRequest::new("foo")
        .account_id(3)
        .min_id(time_to_snowflake(min_time));

    let normalized = normalize(&request, &source).unwrap();
    let inline = format!(
        "foo from:@bob@remote.example after:\"{}\"",
        format_timestamp(min_time)
    );
    assert_eq!(normalized, inline);
    assert_eq!(parse(&normalized).unwrap(), parse(&inline).unwrap());

    let parsed = parse(&inline).unwrap();
    assert_eq!(parsed.terms, vec!["foo"]);
    assert_eq!(parsed.from.as_deref(), Some("bob@remote.example"));
    assert_eq!(parsed.after, Some(min_time));
}

#[test]
fn test_both_calling_conventions_return_same_hits() {
    let source = populated_source();
    let relationships = MemoryRelationships::new();
    let engine = deployed_engine(&source);
    let search = StatusSearch::new(&source, &source, &relationships).with_engine(&engine);

    let legacy = SearchRequest::new("cat")
        .viewer(1)
        .account_id(2)
        .max_id(id_at(30));
    let inline = SearchRequest::new(format!(
        "cat from:@alice before:\"{}\"",
        format_timestamp(Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap())
    ))
    .viewer(1);

    let expected = vec![id_at(1)];
    assert_eq!(hit_ids(&search, &legacy), expected);
    assert_eq!(hit_ids(&search, &inline), expected);
}

#[test]
fn test_translation_errors_are_bad_requests() {
    let source = populated_source();
    let relationships = MemoryRelationships::new();
    let search = StatusSearch::new(&source, &source, &relationships);

    let err = search
        .search(&SearchRequest::new("cat").account_id(999))
        .unwrap_err();
    assert!(matches!(err, SyncError::UnknownAccount(999)));
    assert!(err.is_bad_request());

    for query in ["cat after:yesterday", "cat has:everything", "from:@"] {
        let err = search.search(&SearchRequest::new(query)).unwrap_err();
        assert!(err.is_bad_request(), "{} should be a bad request", query);
    }
}

// ==================== Visibility ====================

#[test]
fn test_private_statuses_reach_their_audience_only() {
    let source = populated_source();
    let relationships = MemoryRelationships::new();
    let engine = deployed_engine(&source);
    let search = StatusSearch::new(&source, &source, &relationships).with_engine(&engine);

    let viewer_hits = hit_ids(&search, &SearchRequest::new("cat").viewer(1));
    assert!(viewer_hits.contains(&id_at(3)));
    assert!(!viewer_hits.contains(&id_at(4)));

    let dave_hits = hit_ids(&search, &SearchRequest::new("cat").viewer(5));
    assert!(dave_hits.contains(&id_at(3)));
    assert!(dave_hits.contains(&id_at(4)));

    let anonymous = hit_ids(&search, &SearchRequest::new("cat"));
    assert_eq!(anonymous, vec![id_at(5), id_at(2), id_at(1)]);
}

#[test]
fn test_fallback_applies_same_visibility() {
    let source = populated_source();
    let relationships = MemoryRelationships::new();
    relationships.mute(1, 6);
    let engine = deployed_engine(&source);
    let down = DownEngine;

    let with_engine = StatusSearch::new(&source, &source, &relationships).with_engine(&engine);
    let fallback = StatusSearch::new(&source, &source, &relationships).with_engine(&down);

    for viewer in [1, 5, 6] {
        let request = SearchRequest::new("cat").viewer(viewer);
        let primary = with_engine.search(&request).unwrap();
        let secondary = fallback.search(&request).unwrap();
        assert_eq!(primary.backend, Backend::Engine);
        assert_eq!(secondary.backend, Backend::Fallback);
        let primary_ids: Vec<u64> = primary.hits.iter().map(|h| h.id).collect();
        let secondary_ids: Vec<u64> = secondary.hits.iter().map(|h| h.id).collect();
        assert_eq!(primary_ids, secondary_ids, "viewer {}", viewer);
    }
}

#[test]
fn test_missing_index_falls_back() {
    let source = populated_source();
    let relationships = MemoryRelationships::new();
    let empty = LocalEngine::new();
    let search = StatusSearch::new(&source, &source, &relationships).with_engine(&empty);

    let results = search.search(&SearchRequest::new("cat picture")).unwrap();
    assert_eq!(results.backend, Backend::Fallback);
    assert_eq!(results.hits.len(), 1);
    assert_eq!(results.hits[0].id, id_at(5));
}

// ==================== Post-filtering ====================

#[test]
fn test_blocked_author_is_removed_after_retrieval() {
    let source = populated_source();
    let relationships = MemoryRelationships::new();
    let engine = deployed_engine(&source);
    let search = StatusSearch::new(&source, &source, &relationships).with_engine(&engine);
    let request = SearchRequest::new("cat").viewer(1);

    assert!(hit_ids(&search, &request).contains(&id_at(1)));
    // The engine still returns alice's status; only the post-filter hides it.
    let raw = engine
        .query(
            "statuses",
            &EngineQuery::lower(parse("cat").unwrap(), &source, Some(1), 20, 0),
        )
        .unwrap();
    assert!(raw.iter().any(|doc| doc["id"].as_u64() == Some(id_at(1))));

    relationships.block(1, 2);
    assert!(!hit_ids(&search, &request).contains(&id_at(1)));
}

#[test]
fn test_reverse_block_mute_and_domain_block_hide_hits() {
    let source = populated_source();
    let relationships = MemoryRelationships::new();
    let engine = deployed_engine(&source);
    let search = StatusSearch::new(&source, &source, &relationships).with_engine(&engine);
    let request = SearchRequest::new("cat").viewer(1);

    relationships.block(2, 1);
    relationships.mute(1, 6);
    relationships.block_domain(1, "Remote.Example");

    assert_eq!(hit_ids(&search, &request), vec![id_at(3)]);

    // Another viewer is unaffected.
    let other = hit_ids(&search, &SearchRequest::new("cat").viewer(5));
    assert!(other.contains(&id_at(1)));
    assert!(other.contains(&id_at(2)));
}

#[test]
fn test_suspended_author_hidden_from_everyone() {
    let source = populated_source();
    let relationships = MemoryRelationships::new();
    let engine = deployed_engine(&source);
    relationships.suspend(6);
    let search = StatusSearch::new(&source, &source, &relationships).with_engine(&engine);

    assert!(!hit_ids(&search, &SearchRequest::new("cat")).contains(&id_at(5)));
}

// ==================== Operators & Paging ====================

#[test]
fn test_operators_narrow_results() {
    let source = populated_source();
    let relationships = MemoryRelationships::new();
    let engine = deployed_engine(&source);
    let search = StatusSearch::new(&source, &source, &relationships).with_engine(&engine);

    assert_eq!(
        hit_ids(&search, &SearchRequest::new("cat has:media language:en")),
        vec![id_at(5)]
    );
    assert_eq!(
        hit_ids(&search, &SearchRequest::new("\"remote cat\"")),
        vec![id_at(2)]
    );
    assert!(hit_ids(&search, &SearchRequest::new("cat from:@nobody")).is_empty());
    assert!(hit_ids(&search, &SearchRequest::new("   ")).is_empty());
    assert!(hit_ids(&search, &SearchRequest::new("cat").limit(0)).is_empty());
}

#[test]
fn test_results_newest_first_with_limit_and_offset() {
    let source = populated_source();
    let relationships = MemoryRelationships::new();
    let engine = deployed_engine(&source);
    let search = StatusSearch::new(&source, &source, &relationships).with_engine(&engine);

    let all = hit_ids(&search, &SearchRequest::new("cat").viewer(5));
    assert_eq!(all, vec![id_at(5), id_at(4), id_at(3), id_at(2), id_at(1)]);

    let page = hit_ids(&search, &SearchRequest::new("cat").viewer(5).limit(2).offset(1));
    assert_eq!(page, vec![id_at(4), id_at(3)]);
}
