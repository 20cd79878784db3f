//! Integration Tests for the SQLite backed cache
//!
//! Exercises the public API end to end, including the background sweeper.

use std::time::Duration;

use mini_cache::{Cache, CacheError, CacheOptions, SetOptions};
use serde_json::{json, Map, Value};

// == Helper Functions ==

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_cache=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn create_test_cache() -> Cache {
    init_tracing();
    Cache::from_value(&json!({})).unwrap()
}

fn big_object(keys: usize) -> Value {
    let mut object = Map::new();
    for i in 0..keys {
        object.insert(format!("key{i}"), json!(i));
    }
    Value::Object(object)
}

// == Basic Operations ==

#[tokio::test]
async fn test_set_then_get_returns_value() {
    let cache = create_test_cache();

    assert!(cache.set("test", &json!({ "a": 1, "b": 2 })).await.unwrap());
    let value: Option<Value> = cache.get("test").await.unwrap();

    assert_eq!(value, Some(json!({ "a": 1, "b": 2 })));
}

#[tokio::test]
async fn test_get_unknown_key_is_absent() {
    let cache = create_test_cache();
    cache.set("known", &"value").await.unwrap();

    let value: Option<String> = cache.get("unknown").await.unwrap();
    assert!(value.is_none());
}

#[tokio::test]
async fn test_delete_removes_entry() {
    let cache = create_test_cache();
    cache.set("test", &42).await.unwrap();

    cache.delete("test").await.unwrap();
    // Deleting again is a silent no-op
    cache.delete("test").await.unwrap();

    assert_eq!(cache.get::<i32>("test").await.unwrap(), None);
}

#[tokio::test]
async fn test_clear_removes_every_entry() {
    let cache = create_test_cache();
    for i in 0..10 {
        cache.set(&format!("key{i}"), &i).await.unwrap();
    }

    cache.clear().await.unwrap();

    for i in 0..10 {
        assert_eq!(cache.get::<i32>(&format!("key{i}")).await.unwrap(), None);
    }
    assert!(cache.is_empty().await.unwrap());
}

// == Expiration ==

#[tokio::test]
async fn test_ttl_expiry() {
    init_tracing();
    let cache = Cache::from_value(&json!({ "sweepIntervalMs": 100 })).unwrap();

    cache
        .set_with(
            "test",
            &json!({ "a": 1, "b": 2 }),
            SetOptions::new().ttl(Duration::from_millis(1000)),
        )
        .await
        .unwrap();
    assert!(cache.get::<Value>("test").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(cache.get::<Value>("test").await.unwrap(), None);
    // The sweeper has removed the row itself by now
    assert_eq!(cache.len().await.unwrap(), 0);
    assert_eq!(cache.stats().expired, 1);
}

#[tokio::test]
async fn test_default_ttl_from_options() {
    init_tracing();
    let cache = Cache::from_value(&json!({ "defaultTtlMs": 100, "sweepIntervalMs": 50 })).unwrap();

    cache.set("short", &"lived").await.unwrap();
    cache
        .set_with("long", &"lived", SetOptions::new().ttl(Duration::from_secs(60)))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(cache.get::<String>("short").await.unwrap(), None);
    assert_eq!(cache.get::<String>("long").await.unwrap().as_deref(), Some("lived"));
}

// == Compression ==

#[tokio::test]
async fn test_big_object_is_compressed() {
    let cache = create_test_cache();
    let big = big_object(10_000);

    cache
        .set_with("test", &big, SetOptions::new().compress(true))
        .await
        .unwrap();

    let cached = cache.get_with_meta::<Value>("test").await.unwrap().unwrap();
    assert_eq!(cached.key, "test");
    assert!(cached.compressed);
    assert_eq!(cached.value, big);
}

#[tokio::test]
async fn test_small_payload_is_not_compressed() {
    let cache = create_test_cache();

    cache
        .set_with("test", &json!({ "a": 1 }), SetOptions::new().compress(true))
        .await
        .unwrap();

    let cached = cache.get_with_meta::<Value>("test").await.unwrap().unwrap();
    assert!(!cached.compressed);
    assert_eq!(cached.value, json!({ "a": 1 }));
}

#[tokio::test]
async fn test_compress_option_from_config() {
    init_tracing();
    let cache = Cache::from_value(&json!({ "compress": true })).unwrap();

    cache.set("big", &big_object(500)).await.unwrap();

    let cached = cache.get_with_meta::<Value>("big").await.unwrap().unwrap();
    assert!(cached.compressed);
}

// == Capacity ==

#[tokio::test]
async fn test_lru_bound_keeps_most_recent() {
    init_tracing();
    let cache = Cache::open(CacheOptions::new().max_items(5).sweep_interval(Duration::from_millis(50)))
        .unwrap();

    for i in 0..5 {
        cache.set(&format!("key{i}"), &i).await.unwrap();
        tokio::time::sleep(Duration::from_millis(3)).await;
    }
    // key0 becomes the most recently accessed
    assert_eq!(cache.get::<i32>("key0").await.unwrap(), Some(0));
    tokio::time::sleep(Duration::from_millis(3)).await;

    for i in 5..8 {
        cache.set(&format!("key{i}"), &i).await.unwrap();
        tokio::time::sleep(Duration::from_millis(3)).await;
    }
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(cache.len().await.unwrap(), 5);
    for key in ["key0", "key4", "key5", "key6", "key7"] {
        assert!(cache.get::<i32>(key).await.unwrap().is_some(), "{key} should remain");
    }
    for key in ["key1", "key2", "key3"] {
        assert!(cache.get::<i32>(key).await.unwrap().is_none(), "{key} should be evicted");
    }
}

// == Lifecycle ==

#[tokio::test]
async fn test_closed_cache_rejects_operations() {
    let cache = create_test_cache();
    cache.set("test", &1).await.unwrap();

    cache.close().await.unwrap();

    assert!(cache.is_closed());
    assert!(matches!(cache.get::<i32>("test").await, Err(CacheError::Closed)));
    assert!(matches!(cache.set("test", &2).await, Err(CacheError::Closed)));
    assert!(matches!(cache.delete("test").await, Err(CacheError::Closed)));
    assert!(matches!(cache.clear().await, Err(CacheError::Closed)));
    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_file_database_persists_across_reopen() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let options = CacheOptions::new().database(path.to_string_lossy());

    let cache = Cache::open(options.clone()).unwrap();
    cache.set("durable", &json!({ "kept": true })).await.unwrap();
    cache.close().await.unwrap();

    let reopened = Cache::open(options).unwrap();
    let value: Option<Value> = reopened.get("durable").await.unwrap();
    assert_eq!(value, Some(json!({ "kept": true })));
    reopened.close().await.unwrap();
}

// == Configuration ==

#[tokio::test]
async fn test_invalid_configuration_names_fields() {
    let cases = [
        (json!({ "database": 1 }), vec!["database"]),
        (json!({ "defaultTtlMs": "1s" }), vec!["defaultTtlMs"]),
        (json!({ "compress": "true" }), vec!["compress"]),
        (json!({ "maxItems": "ten" }), vec!["maxItems"]),
        (json!({ "database": [], "maxItems": false }), vec!["database", "maxItems"]),
    ];

    for (options, expected) in cases {
        match Cache::from_value(&options) {
            Err(err @ CacheError::InvalidConfiguration(_)) => {
                assert_eq!(err.invalid_fields(), expected.as_slice(), "options: {options}");
            }
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("options {options} should be rejected"),
        }
    }
}

#[test]
fn test_open_requires_runtime() {
    let result = Cache::from_value(&json!({}));
    assert!(matches!(result, Err(CacheError::Runtime(_))));
}
