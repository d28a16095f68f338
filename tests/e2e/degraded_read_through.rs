//! 端到端测试：后端故障下的读穿透
//!
//! 测试场景：
//! 1. memory 层 + 弹性包装的远端层（可切换宕机）
//! 2. 远端宕机：读穿透仍从上游加载并写入 memory
//! 3. 远端持续失败导致熔断，之后请求不再触达远端
//! 4. 上游也失败时使用降级值

use crate::common::FlakyStore;
use cacheron::{
    cache::{MemoryStore, PromotionMode, ResilientStore, TieredCacheManager},
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig},
    error::{CacheError, ErrorKind},
    fallback::FallbackExecutor,
    retry::{RetryConfig, RetryExecutor},
    storage::CacheStore,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_read_through_with_remote_down() {
    let memory = Arc::new(MemoryStore::new(100));
    let remote = Arc::new(FlakyStore::new());
    let breaker = Arc::new(CircuitBreaker::new(
        "remote",
        CircuitBreakerConfig::new(2, Duration::from_secs(30)),
    ));
    let resilient = Arc::new(ResilientStore::new(
        remote.clone(),
        breaker.clone(),
        RetryExecutor::new(RetryConfig::new(1, Duration::from_millis(1), 1.0).jitter(false)),
    ));

    let manager = TieredCacheManager::new().with_promotion_mode(PromotionMode::Inline);
    manager.add_layer("memory", memory.clone(), 10);
    manager.add_layer("remote", resilient, 1);

    remote.set_down(true);

    // 读穿透：远端读失败被跳过，上游加载，写回时远端失败但 memory 成功
    let value = manager
        .remember("user:1", None, || async { Ok("alice".to_string()) })
        .await
        .unwrap();
    assert_eq!(value, "alice");
    assert!(memory.has("user:1").await.unwrap());
    // 读失败与写回失败各计一次
    assert!(breaker.is_open());

    // 熔断后不再触达远端
    let calls = remote.calls();
    assert_eq!(manager.get("user:2").await.unwrap(), None);
    assert_eq!(remote.calls(), calls);

    // 上游也失败时降级
    let fallback = FallbackExecutor::<String, String>::new()
        .on(ErrorKind::Upstream, |_, key| format!("anonymous:{}", key));
    let key = "user:3".to_string();
    let value = fallback
        .execute(
            || {
                manager.remember(&key, None, || async {
                    Err(CacheError::Upstream("directory down".to_string()))
                })
            },
            &key,
        )
        .await
        .unwrap();
    assert_eq!(value, "anonymous:user:3");
    assert!(!memory.has("user:3").await.unwrap());
}
