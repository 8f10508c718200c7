//! Criterion benchmarks for search-deploy.

use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use rand::Rng;

use search_deploy::backend::LocalEngine;
use search_deploy::engine::{BatchTransformer, DeployOptions, Deployer, FailurePolicy};
use search_deploy::index::{IndexRegistry, MemoryFingerprintStore};
use search_deploy::search::{MemoryRelationships, SearchRequest, StatusSearch};
use search_deploy::source::MemoryRecordSource;
use search_deploy::types::{Record, Status, Visibility};

const WORDS: [&str; 8] = [
    "garden", "tomato", "rust", "coffee", "bicycle", "rain", "concert", "kitten",
];

/// Random statuses with a mix of visibilities and audiences.
fn make_statuses(count: usize) -> Vec<Record> {
    let mut rng = rand::thread_rng();
    let visibilities = [
        Visibility::Public,
        Visibility::Unlisted,
        Visibility::Private,
        Visibility::Direct,
    ];

    (1..=count as u64)
        .map(|id| {
            let text: Vec<&str> = (0..6).map(|_| WORDS[rng.gen_range(0..WORDS.len())]).collect();
            let remote = rng.gen_bool(0.3);
            Record::Status(Status {
                id: id << 16,
                account_id: rng.gen_range(1..500),
                account_domain: remote.then(|| "remote.example".to_string()),
                text: text.join(" "),
                visibility: visibilities[rng.gen_range(0..visibilities.len())],
                has_media: rng.gen_bool(0.2),
                favourited_by: (0..rng.gen_range(0..3)).map(|_| rng.gen_range(1..500)).collect(),
                mentioned: (0..rng.gen_range(0..2)).map(|_| rng.gen_range(1..500)).collect(),
                ..Default::default()
            })
        })
        .collect()
}

fn make_source(count: usize) -> MemoryRecordSource {
    let source = MemoryRecordSource::new();
    for record in make_statuses(count) {
        source.insert(record);
    }
    source
}

fn bench_transform_1k(c: &mut Criterion) {
    let records = make_statuses(1_000);
    let transformer = BatchTransformer::new();

    c.bench_function("transform_1k_statuses", |b| {
        b.iter(|| transformer.transform(&records))
    });
}

fn bench_deploy_10k(c: &mut Criterion) {
    let source = make_source(10_000);
    let registry = IndexRegistry::standard();
    let statuses = registry.select(&["statuses".to_string()]).unwrap();
    let options = DeployOptions {
        concurrency: 4,
        batch_size: 1_000,
        backoff: Duration::ZERO,
        failure_policy: FailurePolicy::BestEffort,
    };

    c.bench_function("deploy_10k_statuses", |b| {
        b.iter(|| {
            let engine = LocalEngine::new();
            let fingerprints = MemoryFingerprintStore::new();
            let _ = Deployer::new(&engine, &source, &fingerprints, options.clone())
                .with_suffix(1)
                .deploy(&statuses);
        })
    });
}

fn bench_fallback_search_10k(c: &mut Criterion) {
    let source = make_source(10_000);
    let relationships = MemoryRelationships::new();
    let search = StatusSearch::new(&source, &source, &relationships);
    let request = SearchRequest::new("tomato kitten has:media").viewer(42);

    c.bench_function("fallback_search_10k", |b| {
        b.iter(|| {
            let _ = search.search(&request);
        })
    });
}

criterion_group!(
    benches,
    bench_transform_1k,
    bench_deploy_10k,
    bench_fallback_search_10k,
);
criterion_main!(benches);
