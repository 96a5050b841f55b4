mod common;

use common::{document, MemoryStore};
use docstore_core::{CacheConfig, ReadThroughCache, StoreError};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn cache_over(store: &Arc<MemoryStore>, config: CacheConfig) -> ReadThroughCache<MemoryStore> {
    ReadThroughCache::new(Arc::clone(store), config)
}

#[tokio::test]
async fn miss_reads_store_once_then_serves_from_cache() {
    let store = Arc::new(MemoryStore::new());
    let stored = document(Uuid::new_v4(), 100);
    store.seed(stored.clone());
    let cache = cache_over(&store, CacheConfig::default());

    let first = cache.get(stored.id).await.unwrap().unwrap();
    let second = cache.get(stored.id).await.unwrap().unwrap();

    assert_eq!(*first, stored);
    assert_eq!(*second, stored);
    assert_eq!(store.fetch_calls(), 1);
}

#[tokio::test]
async fn not_found_and_store_failure_are_distinct() {
    let store = Arc::new(MemoryStore::new());
    let cache = cache_over(&store, CacheConfig::default());
    let id = Uuid::new_v4();

    assert!(cache.get(id).await.unwrap().is_none());
    assert!(!cache.contains(id));

    store.set_fail_fetches(true);
    let err = cache.get(id).await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}

#[tokio::test]
async fn put_is_served_without_store_read() {
    let store = Arc::new(MemoryStore::new());
    let cache = cache_over(&store, CacheConfig::default());
    let doc = Arc::new(document(Uuid::new_v4(), 5));

    cache.put(Arc::clone(&doc));
    let found = cache.get(doc.id).await.unwrap().unwrap();

    assert_eq!(found, doc);
    assert_eq!(store.fetch_calls(), 0);
    assert!(store.stored(doc.id).is_none());
}

#[tokio::test]
async fn claim_only_inserts_when_absent() {
    let store = Arc::new(MemoryStore::new());
    let cache = cache_over(&store, CacheConfig::default());
    let id = Uuid::new_v4();
    let first = Arc::new(document(id, 1));
    let second = Arc::new(document(id, 2));

    assert!(cache.claim(Arc::clone(&first)));
    assert!(!cache.claim(second));
    assert_eq!(cache.peek(id).unwrap().timestamp, 1);
}

#[tokio::test]
async fn cached_values_are_isolated_from_caller_mutation() {
    let store = Arc::new(MemoryStore::new());
    let cache = cache_over(&store, CacheConfig::default());
    let doc = Arc::new(document(Uuid::new_v4(), 9));
    cache.put(Arc::clone(&doc));

    let mut copy = (*cache.get(doc.id).await.unwrap().unwrap()).clone();
    copy.attributes[0].value = "changed".to_string();

    let again = cache.get(doc.id).await.unwrap().unwrap();
    assert_eq!(again.attributes[0].value, "v");
}

#[tokio::test]
async fn overfilling_evicts_and_evicted_key_costs_one_store_read() {
    let store = Arc::new(MemoryStore::new());
    let cache = cache_over(&store, CacheConfig::default().with_max_cost(3));

    let docs: Vec<_> = (0..10).map(|offset| document(Uuid::new_v4(), offset)).collect();
    for doc in &docs {
        store.seed(doc.clone());
        cache.put(Arc::new(doc.clone()));
        cache.run_pending_tasks();
    }
    cache.run_pending_tasks();

    assert!(cache.entry_count() <= 3);
    let evicted: Vec<_> = docs.iter().filter(|doc| !cache.contains(doc.id)).collect();
    assert!(!evicted.is_empty());

    let before = store.fetch_calls();
    let fetched = cache.get(evicted[0].id).await.unwrap().unwrap();
    assert_eq!(*fetched, *evicted[0]);
    assert_eq!(store.fetch_calls(), before + 1);
}

#[tokio::test]
async fn entries_expire_when_ttl_is_configured() {
    let store = Arc::new(MemoryStore::new());
    let cache = cache_over(
        &store,
        CacheConfig::default().with_ttl(Duration::from_millis(50)),
    );
    let doc = Arc::new(document(Uuid::new_v4(), 3));
    cache.put(Arc::clone(&doc));
    assert!(cache.contains(doc.id));

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(cache.peek(doc.id).is_none());
    assert!(cache.get(doc.id).await.unwrap().is_none());
    assert_eq!(store.fetch_calls(), 1);
}

#[tokio::test]
async fn invalidate_forces_store_fallback() {
    let store = Arc::new(MemoryStore::new());
    let doc = document(Uuid::new_v4(), 11);
    store.seed(doc.clone());
    let cache = cache_over(&store, CacheConfig::default());
    cache.put(Arc::new(doc.clone()));

    cache.invalidate(doc.id);
    let found = cache.get(doc.id).await.unwrap().unwrap();

    assert_eq!(*found, doc);
    assert_eq!(store.fetch_calls(), 1);
}
