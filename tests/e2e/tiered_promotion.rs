//! 端到端测试：分层提升
//!
//! 测试场景：
//! 1. 两层缓存：memory(优先级10) 与 redis(优先级5，测试中用第二个内存存储代替)
//! 2. 只向 redis 写入 x=1
//! 3. 分层读取 x，返回 "1"
//! 4. memory 层随后也持有 x（提升）
//! 5. 再次读取直接命中 memory

use cacheron::{
    cache::{MemoryStore, PromotionMode, TieredCacheManager},
    storage::CacheStore,
};
use std::sync::Arc;

#[tokio::test]
async fn test_memory_redis_promotion() {
    let memory = Arc::new(MemoryStore::new(1000));
    let redis = Arc::new(MemoryStore::new(100_000));

    let manager = TieredCacheManager::new();
    manager.add_layer("memory", memory.clone(), 10);
    manager.add_layer("redis", redis.clone(), 5);

    redis.set("x", "1", None).await.unwrap();

    let value = manager.get("x").await.unwrap();
    assert_eq!(value.as_deref(), Some("1"));

    manager.wait_for_promotions().await;
    assert!(memory.has("x").await.unwrap());

    manager.get("x").await.unwrap();
    let stats = manager.manager_stats();
    assert_eq!(stats.hits.get("memory"), Some(&1));
    assert_eq!(stats.hits.get("redis"), Some(&1));
    assert_eq!(stats.promotions, 1);
}

/// 三层时只提升到优先级更高的层
#[tokio::test]
async fn test_promotion_only_moves_upward() {
    let top = Arc::new(MemoryStore::new(10));
    let middle = Arc::new(MemoryStore::new(10));
    let bottom = Arc::new(MemoryStore::new(10));

    let manager = TieredCacheManager::new().with_promotion_mode(PromotionMode::Inline);
    manager.add_layer("bottom", bottom.clone(), 1);
    manager.add_layer("top", top.clone(), 30);
    manager.add_layer("middle", middle.clone(), 20);

    middle.set("k", "v", None).await.unwrap();
    assert_eq!(manager.get("k").await.unwrap().as_deref(), Some("v"));

    assert!(top.has("k").await.unwrap());
    assert!(!bottom.has("k").await.unwrap());
}
