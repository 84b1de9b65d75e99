//! Tests for the read cache.

use gallerist_cache::{ManualClock, ReadCache, ReadCacheConfig, ReadCacheConfigBuilder};
use std::sync::Arc;
use std::time::Duration;

fn cache_with_clock(config: ReadCacheConfig) -> (ReadCache<Option<i64>, Vec<u32>>, ManualClock) {
    let clock = ManualClock::new();
    let cache = ReadCache::with_clock(config, Arc::new(clock.clone()));
    (cache, clock)
}

#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let config = ReadCacheConfig::default().with_default_ttl(10);
    let (cache, clock) = cache_with_clock(config);

    cache.insert(Some(5), vec![1, 2, 3]).await;
    clock.advance(Duration::from_secs(9));
    assert_eq!(cache.get(&Some(5)).await, Some(vec![1, 2, 3]));

    clock.advance(Duration::from_secs(1));
    assert_eq!(cache.get(&Some(5)).await, None);
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_keys_with_different_limits_do_not_collide() {
    let (cache, _clock) = cache_with_clock(ReadCacheConfig::default());

    cache.insert(None, vec![1, 2, 3]).await;
    cache.insert(Some(1), vec![1]).await;

    assert_eq!(cache.get(&None).await, Some(vec![1, 2, 3]));
    assert_eq!(cache.get(&Some(1)).await, Some(vec![1]));
    assert_eq!(cache.get(&Some(2)).await, None);
}

#[tokio::test]
async fn test_lru_eviction() {
    let config = ReadCacheConfigBuilder::default()
        .default_ttl(60)
        .max_size(2)
        .enabled(true)
        .build()
        .unwrap();
    let (cache, _clock) = cache_with_clock(config);

    cache.insert(Some(1), vec![1]).await;
    cache.insert(Some(2), vec![2]).await;
    // Touch 1 so 2 becomes least recently used
    assert!(cache.get(&Some(1)).await.is_some());
    cache.insert(Some(3), vec![3]).await;

    assert_eq!(cache.len().await, 2);
    assert!(cache.get(&Some(1)).await.is_some());
    assert!(cache.get(&Some(2)).await.is_none());
    assert!(cache.get(&Some(3)).await.is_some());
}

#[tokio::test]
async fn test_invalidate_and_clear() {
    let (cache, _clock) = cache_with_clock(ReadCacheConfig::default());

    cache.insert(Some(1), vec![1]).await;
    cache.insert(Some(2), vec![2]).await;

    assert!(cache.invalidate(&Some(1)).await);
    assert!(!cache.invalidate(&Some(1)).await);
    assert_eq!(cache.len().await, 1);

    cache.clear().await;
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_load_racing_a_clear_is_not_cached() {
    let (cache, _clock) = cache_with_clock(ReadCacheConfig::default());

    let before_load = cache.generation().await;
    cache.clear().await;
    assert!(!cache.insert_if_generation(None, vec![0], before_load).await);
    assert_eq!(cache.get(&None).await, None);

    let fresh = cache.generation().await;
    assert!(cache.insert_if_generation(None, vec![1], fresh).await);
    assert_eq!(cache.get(&None).await, Some(vec![1]));
}

#[tokio::test]
async fn test_invalidate_advances_generation() {
    let (cache, _clock) = cache_with_clock(ReadCacheConfig::default());
    let start = cache.generation().await;

    cache.invalidate(&Some(3)).await;
    assert_ne!(cache.generation().await, start);
    assert!(!cache.insert_if_generation(Some(3), vec![3], start).await);
}

#[tokio::test]
async fn test_disabled_cache_stores_nothing() {
    let (cache, _clock) = cache_with_clock(ReadCacheConfig::default().with_enabled(false));

    cache.insert(None, vec![1]).await;
    assert_eq!(cache.get(&None).await, None);
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_cleanup_expired() {
    let (cache, clock) = cache_with_clock(ReadCacheConfig::default().with_default_ttl(5));

    cache.insert(Some(1), vec![1]).await;
    cache
        .insert_with_ttl(Some(2), vec![2], Duration::from_secs(60))
        .await;
    clock.advance(Duration::from_secs(6));

    assert_eq!(cache.cleanup_expired().await, 1);
    assert_eq!(cache.get(&Some(2)).await, Some(vec![2]));
}

#[test]
fn test_config_defaults_from_empty_document() {
    let config: ReadCacheConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, ReadCacheConfig::default());
}
