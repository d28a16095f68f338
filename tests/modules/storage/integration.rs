//! 存储后端集成测试
//!
//! 对每个后端运行同一组契约检查

use cacheron::{
    cache::{FileStore, MemoryStore},
    error::StorageError,
    storage::CacheStore,
};
use std::time::Duration;

/// 所有后端都必须满足的行为
async fn check_store_contract(store: &dyn CacheStore) {
    // 基本读写
    assert_eq!(store.get("missing").await.unwrap(), None);
    assert!(store.set("a", "1", None).await.unwrap());
    assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
    assert!(store.has("a").await.unwrap());

    // 覆盖写
    store.set("a", "2", None).await.unwrap();
    assert_eq!(store.get("a").await.unwrap().as_deref(), Some("2"));

    // 删除：存在返回true，不存在返回false
    assert!(store.delete("a").await.unwrap());
    assert!(!store.delete("a").await.unwrap());
    assert!(!store.has("a").await.unwrap());

    // 零TTL视为永不过期
    store.set("forever", "x", Some(Duration::ZERO)).await.unwrap();

    // 过期
    store
        .set("short", "y", Some(Duration::from_millis(30)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(store.get("short").await.unwrap(), None);
    assert!(!store.has("short").await.unwrap());
    assert_eq!(store.get("forever").await.unwrap().as_deref(), Some("x"));

    // 非法键
    let err = store.set("", "v", None).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidKey(_)));

    // 批量操作
    let items = vec![
        ("b1".to_string(), "1".to_string()),
        ("b2".to_string(), "2".to_string()),
    ];
    let written = store.set_multiple(&items, None).await;
    assert!(written.values().all(|r| matches!(r, Ok(true))));

    let keys = vec!["b1".to_string(), "b2".to_string(), "b3".to_string()];
    let values = store.get_multiple(&keys).await;
    assert_eq!(values["b1"].as_ref().unwrap().as_deref(), Some("1"));
    assert_eq!(values["b3"].as_ref().unwrap(), &None);

    let deleted = store.delete_multiple(&keys).await;
    assert!(matches!(deleted["b2"], Ok(true)));
    assert!(matches!(deleted["b3"], Ok(false)));

    // 清空
    assert!(store.clear().await.unwrap());
    assert_eq!(store.get("forever").await.unwrap(), None);
}

#[tokio::test]
async fn test_memory_store_contract() {
    let store = MemoryStore::new(100);
    check_store_contract(&store).await;
}

#[tokio::test]
async fn test_file_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path()).await.unwrap();
    check_store_contract(&store).await;
}

/// LRU淘汰最久未使用的条目
#[tokio::test]
async fn test_memory_store_eviction() {
    let store = MemoryStore::new(2);
    store.set("a", "1", None).await.unwrap();
    store.set("b", "2", None).await.unwrap();
    store.get("a").await.unwrap();
    store.set("c", "3", None).await.unwrap();

    assert!(store.has("a").await.unwrap());
    assert!(!store.has("b").await.unwrap());
    assert_eq!(store.memory_stats().evictions(), 1);
    assert_eq!(store.stats()["entries"], 2);
}

/// 损坏的缓存文件返回序列化错误
#[tokio::test]
async fn test_file_store_corrupt_entry() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path()).await.unwrap();
    store.set("k", "v", None).await.unwrap();

    let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
    let entry = entries.next_entry().await.unwrap().unwrap();
    tokio::fs::write(entry.path(), b"{not json").await.unwrap();

    let err = store.get("k").await.unwrap_err();
    assert!(matches!(err, StorageError::SerializationFailed(_)));
}

/// 需要本地Redis：`cargo test --features redis -- --ignored`
#[cfg(feature = "redis")]
#[tokio::test]
#[ignore]
async fn test_redis_store_contract() {
    use cacheron::cache::{RedisConfig, RedisStore};

    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let store = RedisStore::connect(RedisConfig::new(url).key_prefix("cacheron-test:"))
        .await
        .unwrap();
    store.ping().await.unwrap();
    check_store_contract(&store).await;
}
