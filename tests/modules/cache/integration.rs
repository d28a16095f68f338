//! 分层缓存集成测试
//!
//! 测试管理器与内存、文件存储以及故障存储的协作

use crate::common::{two_tier_manager, FailingStore, FlakyStore};
use cacheron::{
    cache::{FileStore, MemoryStore, PromotionMode, TieredCacheManager},
    error::{CacheError, ErrorKind, StorageError},
    storage::CacheStore,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 低优先级层命中后提升到高优先级层
#[tokio::test]
async fn test_promotion_from_slow_to_fast() {
    let (manager, fast, slow) = two_tier_manager();

    slow.set("user:1", "alice", None).await.unwrap();
    assert_eq!(fast.get("user:1").await.unwrap(), None);

    let value = manager.get("user:1").await.unwrap();
    assert_eq!(value.as_deref(), Some("alice"));
    assert_eq!(fast.get("user:1").await.unwrap().as_deref(), Some("alice"));

    let stats = manager.manager_stats();
    assert_eq!(stats.promotions, 1);
    assert_eq!(stats.hits.get("slow"), Some(&1));
}

/// 后台提升在 wait_for_promotions 之后可见
#[tokio::test]
async fn test_background_promotion() {
    let fast = Arc::new(MemoryStore::new(100));
    let slow = Arc::new(MemoryStore::new(100));
    let manager = TieredCacheManager::new();
    assert_eq!(manager.promotion_mode(), PromotionMode::Background);
    manager.add_layer("fast", fast.clone(), 10);
    manager.add_layer("slow", slow.clone(), 5);

    slow.set("k", "v", None).await.unwrap();
    assert_eq!(manager.get("k").await.unwrap().as_deref(), Some("v"));

    manager.wait_for_promotions().await;
    assert_eq!(fast.get("k").await.unwrap().as_deref(), Some("v"));
}

/// 文件存储作为最底层
#[tokio::test]
async fn test_memory_over_file() {
    let dir = tempfile::tempdir().unwrap();
    let disk = Arc::new(FileStore::new(dir.path()).await.unwrap());
    let memory = Arc::new(MemoryStore::new(10));

    let manager = TieredCacheManager::new().with_promotion_mode(PromotionMode::Inline);
    manager.add_layer("disk", disk.clone(), 1);
    manager.add_layer("memory", memory.clone(), 10);

    let report = manager.set("doc", "{\"a\":1}", None, Some(&["disk"])).await;
    assert!(report.is_success());
    assert!(!memory.has("doc").await.unwrap());

    assert_eq!(manager.get("doc").await.unwrap().as_deref(), Some("{\"a\":1}"));
    assert!(memory.has("doc").await.unwrap());

    // 新的管理器实例仍能从磁盘读到
    let reopened = Arc::new(FileStore::new(dir.path()).await.unwrap());
    assert_eq!(reopened.get("doc").await.unwrap().as_deref(), Some("{\"a\":1}"));
}

/// 出错的层被跳过
#[tokio::test]
async fn test_failing_layer_is_skipped() {
    let manager = TieredCacheManager::new().with_promotion_mode(PromotionMode::Inline);
    let broken = Arc::new(FailingStore::unavailable("broken"));
    let backup = Arc::new(MemoryStore::new(10));
    manager.add_layer("broken", broken.clone(), 10);
    manager.add_layer("backup", backup.clone(), 1);

    backup.set("k", "v", None).await.unwrap();
    assert_eq!(manager.get("k").await.unwrap().as_deref(), Some("v"));
    // 一次查询 + 一次失败的提升
    assert_eq!(broken.calls.load(Ordering::SeqCst), 2);
    assert_eq!(manager.manager_stats().promotion_failures, 1);

    // 所有层都未命中时仍是 None
    assert_eq!(manager.get("missing").await.unwrap(), None);
}

/// 所有层都出错时返回错误，宽松读取按未命中处理
#[tokio::test]
async fn test_all_layers_failing() {
    let manager = TieredCacheManager::new();
    manager.add_layer("a", Arc::new(FailingStore::unavailable("a")), 2);
    manager.add_layer(
        "b",
        Arc::new(FailingStore::new(
            "b",
            StorageError::Timeout("slow".to_string()),
        )),
        1,
    );

    let err = manager.get("k").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(manager.get_or_absent("k").await.unwrap(), None);
}

/// 写入是尽力而为的，报告每层结果
#[tokio::test]
async fn test_best_effort_write_report() {
    let manager = TieredCacheManager::new();
    let good = Arc::new(MemoryStore::new(10));
    manager.add_layer("good", good.clone(), 10);
    manager.add_layer("bad", Arc::new(FailingStore::unavailable("bad")), 1);

    let report = manager.set("k", "v", None, None).await;
    assert!(!report.is_success());
    assert!(!report.all_failed());
    assert_eq!(report.failed_layers(), vec!["bad"]);
    assert!(report.outcome("good").unwrap().is_ok());
    assert_eq!(good.get("k").await.unwrap().as_deref(), Some("v"));

    let err = report.into_result().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
}

/// 指定层查询
#[tokio::test]
async fn test_get_in_layer() {
    let (manager, _fast, slow) = two_tier_manager();
    slow.set("k", "v", None).await.unwrap();

    assert_eq!(manager.get_in_layer("k", "slow").await.unwrap(), "v");

    let err = manager.get_in_layer("k", "fast").await.unwrap_err();
    assert!(matches!(err, CacheError::CacheMissInLayer { ref layer, .. } if layer == "fast"));

    let err = manager.get_in_layer("k", "nope").await.unwrap_err();
    assert!(matches!(err, CacheError::UnknownLayer(_)));
}

/// TTL到期后所有层均未命中
#[tokio::test]
async fn test_ttl_expiry_across_layers() {
    let (manager, _fast, _slow) = two_tier_manager();
    manager
        .set("session", "token", Some(Duration::from_millis(50)), None)
        .await;
    assert!(manager.has("session", None).await.unwrap());

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(manager.get("session").await.unwrap(), None);
}

/// 提升的副本不会比源条目活得更久
#[tokio::test]
async fn test_promoted_copy_expires_with_source() {
    let (manager, fast, slow) = two_tier_manager();
    manager
        .set("k", "v", Some(Duration::from_millis(50)), Some(&["slow"]))
        .await
        .into_result()
        .unwrap();

    assert_eq!(manager.get("k").await.unwrap().as_deref(), Some("v"));
    assert!(fast.has("k").await.unwrap());

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(slow.get("k").await.unwrap(), None);
    assert_eq!(fast.get("k").await.unwrap(), None);
    assert_eq!(manager.get("k").await.unwrap(), None);
}

/// 默认TTL限制提升副本的存活时间
#[tokio::test]
async fn test_promotion_capped_by_default_ttl() {
    let manager = TieredCacheManager::new()
        .with_promotion_mode(PromotionMode::Inline)
        .with_default_ttl(Duration::from_millis(50));
    let fast = Arc::new(MemoryStore::new(10));
    let slow = Arc::new(MemoryStore::new(10));
    manager.add_layer("fast", fast.clone(), 10);
    manager.add_layer("slow", slow.clone(), 5);
    slow.set("k", "v", None).await.unwrap();

    manager.get("k").await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;

    assert_eq!(fast.get("k").await.unwrap(), None);
    assert_eq!(slow.get("k").await.unwrap().as_deref(), Some("v"));
}

/// 删除与清空
#[tokio::test]
async fn test_delete_and_clear() {
    let (manager, fast, slow) = two_tier_manager();
    manager.set("a", "1", None, None).await;
    manager.set("b", "2", None, None).await;

    let report = manager.delete("a", Some(&["fast"])).await;
    assert!(report.is_success());
    assert!(!fast.has("a").await.unwrap());
    assert!(slow.has("a").await.unwrap());

    manager.delete("a", None).await;
    assert!(!manager.has("a", None).await.unwrap());

    let report = manager.clear(None).await;
    assert!(report.is_success());
    assert!(fast.is_empty());
    assert!(slow.is_empty());
}

/// 层的动态增删
#[tokio::test]
async fn test_add_and_remove_layers() {
    let (manager, _fast, _slow) = two_tier_manager();
    manager.add_layer("middle", Arc::new(MemoryStore::new(10)), 7);
    assert_eq!(manager.layer_names(), vec!["fast", "middle", "slow"]);

    assert!(manager.remove_layer("middle"));
    assert!(!manager.remove_layer("middle"));
    assert_eq!(manager.layer_names(), vec!["fast", "slow"]);
}

/// 读写进行中替换层列表，已有层始终可见
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_layer_swap_during_traffic() {
    let (manager, _fast, _slow) = two_tier_manager();
    let manager = Arc::new(manager);
    manager.set("k", "v", None, None).await.into_result().unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..200 {
                assert_eq!(manager.get("k").await.unwrap().as_deref(), Some("v"));

                let report = manager.set(&format!("w{}", i), "x", None, None).await;
                assert!(report.is_success());
                assert!(report.outcome("fast").is_some());
                assert!(report.outcome("slow").is_some());
                tokio::task::yield_now().await;
            }
        }));
    }

    let swapper = {
        let manager = manager.clone();
        tokio::spawn(async move {
            for i in 0..200 {
                let name = format!("extra{}", i % 3);
                manager.add_layer(name.clone(), Arc::new(MemoryStore::new(16)), i % 20);
                tokio::task::yield_now().await;
                manager.remove_layer(&name);
            }
        })
    };

    for handle in handles {
        handle.await.unwrap();
    }
    swapper.await.unwrap();

    assert_eq!(manager.layer_names(), vec!["fast", "slow"]);
    assert_eq!(manager.get("w199").await.unwrap().as_deref(), Some("x"));
}

/// 读穿透：并发只加载一次
#[tokio::test]
async fn test_remember_single_flight() {
    let (manager, fast, slow) = two_tier_manager();
    let manager = Arc::new(manager);
    let loads = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let manager = manager.clone();
        let loads = loads.clone();
        handles.push(tokio::spawn(async move {
            manager
                .remember("report", None, || async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok("expensive".to_string())
                })
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "expensive");
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(fast.has("report").await.unwrap());
    assert!(slow.has("report").await.unwrap());
}

/// 读穿透：后端宕机时直接走上游
#[tokio::test]
async fn test_remember_with_backend_down() {
    let flaky = Arc::new(FlakyStore::new());
    let manager = TieredCacheManager::new();
    manager.add_layer("flaky", flaky.clone(), 1);
    flaky.set_down(true);

    let value = manager
        .remember("k", None, || async { Ok("from-source".to_string()) })
        .await
        .unwrap();
    assert_eq!(value, "from-source");

    // 上游失败的结果不缓存
    flaky.set_down(false);
    let err = manager
        .remember("other", None, || async {
            Err(CacheError::Upstream("db down".to_string()))
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert!(!manager.has("other", None).await.unwrap());
}

/// JSON辅助方法
#[tokio::test]
async fn test_json_helpers() {
    #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
    struct Profile {
        id: u64,
        name: String,
    }

    let (manager, _fast, _slow) = two_tier_manager();
    let profile = Profile {
        id: 7,
        name: "bob".to_string(),
    };
    manager
        .set_json("profile:7", &profile, None, None)
        .await
        .unwrap();
    let loaded: Option<Profile> = manager.get_json("profile:7").await.unwrap();
    assert_eq!(loaded, Some(profile));

    let fetched: Profile = manager
        .remember_json("profile:8", None, || async {
            Ok(Profile {
                id: 8,
                name: "carol".to_string(),
            })
        })
        .await
        .unwrap();
    assert_eq!(fetched.id, 8);

    manager.set("bad", "not json", None, None).await;
    let err = manager.get_json::<Profile>("bad").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SerializationFailed);
}

/// 各层统计
#[tokio::test]
async fn test_layer_stats() {
    let (manager, _fast, _slow) = two_tier_manager();
    manager.set("k", "v", None, None).await;
    manager.get("k").await.unwrap();
    manager.get("missing").await.unwrap();

    let stats = manager.stats();
    assert!(stats.contains_key("fast"));
    assert!(stats.contains_key("slow"));

    let snapshot = manager.manager_stats();
    assert_eq!(snapshot.lookups, 2);
    assert_eq!(snapshot.misses, 1);
    assert_eq!(snapshot.total_hits(), 1);
    assert!((snapshot.hit_rate() - 0.5).abs() < f64::EPSILON);
}
