use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use time::macros::datetime;
use tokio_util::sync::CancellationToken;

use vitrine::application::catalog::{
    CacheTtls, CatalogService, CreateProductCommand, METRIC_CACHE_ERROR_TOTAL,
    METRIC_CACHE_HIT_TOTAL, METRIC_CACHE_INVALIDATED_KEYS_TOTAL, METRIC_CACHE_MISS_TOTAL,
    UpdateProductCommand,
};
use vitrine::application::clock::ManualClock;
use vitrine::application::pagination::ListParams;
use vitrine::cache::{
    CacheConfig, CacheError, CachePort, KeySpace, METRIC_MEMORY_EVICT_TOTAL, MemoryCache,
};
use vitrine::infra::memory::MemoryProductsRepo;

struct UnreachableCache;

#[async_trait]
impl CachePort for UnreachableCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::connection("connection refused"))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<(), CacheError> {
        Err(CacheError::connection("connection refused"))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::connection("connection refused"))
    }

    async fn delete_by_prefix(&self, _prefix: &str) -> Result<u64, CacheError> {
        Err(CacheError::connection("connection refused"))
    }
}

fn service(cache: Arc<dyn CachePort>) -> CatalogService {
    CatalogService::new(
        Arc::new(MemoryProductsRepo::default()),
        cache,
        Arc::new(ManualClock::new(datetime!(2024-06-01 12:00:00 UTC))),
        KeySpace::new("vitrine:product:"),
        CacheTtls::default(),
    )
}

fn command(name: &str) -> CreateProductCommand {
    CreateProductCommand {
        name: name.to_string(),
        price: 4.5,
    }
}

/// `(name, sorted labels)` to counter value.
type CounterMap = HashMap<(String, Vec<(String, String)>), u64>;

fn counters(snapshot: metrics_util::debugging::Snapshot) -> CounterMap {
    snapshot
        .into_vec()
        .into_iter()
        .filter_map(|(composite_key, _, _, value)| {
            let DebugValue::Counter(count) = value else {
                return None;
            };
            let key = composite_key.key();
            let mut labels: Vec<(String, String)> = key
                .labels()
                .map(|label| (label.key().to_string(), label.value().to_string()))
                .collect();
            labels.sort();
            Some(((key.name().to_string(), labels), count))
        })
        .collect()
}

fn labelled(name: &str, label: &str, value: &str) -> (String, Vec<(String, String)>) {
    (
        name.to_string(),
        vec![(label.to_string(), value.to_string())],
    )
}

// The recorder is process-global, so every metric path is driven from this one test.
#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let cancel = CancellationToken::new();

    // Entity and list hits, misses and invalidations.
    let healthy = service(Arc::new(MemoryCache::default()));
    let product = healthy.create(command("Widget"), &cancel).await.unwrap();
    healthy.get_by_id(product.id, &cancel).await.unwrap();
    healthy.get_by_id(product.id, &cancel).await.unwrap();
    healthy
        .query(&ListParams::default(), &cancel)
        .await
        .unwrap();
    healthy
        .query(&ListParams::default(), &cancel)
        .await
        .unwrap();
    healthy
        .update(
            product.id,
            UpdateProductCommand {
                name: "Widget v2".into(),
                price: 5.0,
            },
            &cancel,
        )
        .await
        .unwrap();

    // Undecodable entry.
    let shared = Arc::new(MemoryCache::default());
    let decoding = service(shared.clone());
    let product = decoding.create(command("Gadget"), &cancel).await.unwrap();
    shared
        .set(&decoding.keys().entity_key(product.id), "{not json", None)
        .await
        .unwrap();
    decoding.get_by_id(product.id, &cancel).await.unwrap();

    // Unreachable cache on every port operation.
    let failing = service(Arc::new(UnreachableCache));
    let product = failing.create(command("Sprocket"), &cancel).await.unwrap();
    failing.get_by_id(product.id, &cancel).await.unwrap();
    failing.delete(product.id, &cancel).await.unwrap();

    // LRU eviction in the in-process cache.
    let tiny = MemoryCache::new(&CacheConfig {
        memory_capacity: 1,
        ..Default::default()
    });
    tiny.set("a", "1", None).await.unwrap();
    tiny.set("b", "2", None).await.unwrap();

    let counters = counters(snapshotter.snapshot());
    let value = |key: (String, Vec<(String, String)>)| {
        counters
            .get(&key)
            .copied()
            .unwrap_or_else(|| panic!("missing counter {key:?}"))
    };

    assert_eq!(value(labelled(METRIC_CACHE_HIT_TOTAL, "kind", "entity")), 1);
    assert_eq!(value(labelled(METRIC_CACHE_HIT_TOTAL, "kind", "list")), 1);
    assert!(value(labelled(METRIC_CACHE_MISS_TOTAL, "kind", "entity")) >= 3);
    assert_eq!(value(labelled(METRIC_CACHE_MISS_TOTAL, "kind", "list")), 1);

    assert!(value(labelled(METRIC_CACHE_INVALIDATED_KEYS_TOTAL, "kind", "entity")) >= 1);
    assert!(value(labelled(METRIC_CACHE_INVALIDATED_KEYS_TOTAL, "kind", "list")) >= 1);

    assert_eq!(value(labelled(METRIC_CACHE_ERROR_TOTAL, "op", "decode")), 1);
    for op in ["get", "set", "delete", "delete_by_prefix"] {
        assert!(
            value(labelled(METRIC_CACHE_ERROR_TOTAL, "op", op)) >= 1,
            "no error counted for {op}"
        );
    }

    assert_eq!(value((METRIC_MEMORY_EVICT_TOTAL.to_string(), Vec::new())), 1);
}
