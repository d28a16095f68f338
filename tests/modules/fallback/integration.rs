//! 降级模块集成测试
//!
//! 降级执行器与熔断器、分层缓存的组合

use crate::common::two_tier_manager;
use cacheron::{
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig},
    error::{CacheError, ErrorKind},
    fallback::{FallbackExecutor, FallbackKey},
};
use std::sync::Arc;
use std::time::Duration;

/// 熔断打开时返回降级值
#[tokio::test]
async fn test_fallback_on_open_circuit() {
    let breaker = CircuitBreaker::new(
        "pricing",
        CircuitBreakerConfig::new(1, Duration::from_secs(60)),
    );
    let sku = "sku-1".to_string();
    let fallback = FallbackExecutor::<u64, String>::new()
        .value_for(ErrorKind::CircuitOpen, 0)
        .on(ErrorKind::Storage, |_, _| 1);

    let first = fallback
        .execute(
            || breaker.execute(|| async { Err::<u64, _>(CacheError::backend_unavailable("down")) }),
            &sku,
        )
        .await;
    // BackendUnavailable 由父种类 Storage 处理
    assert_eq!(first.unwrap(), 1);
    assert!(breaker.is_open());

    let second = fallback
        .execute(|| breaker.execute(|| async { Ok::<u64, CacheError>(99) }), &sku)
        .await;
    assert_eq!(second.unwrap(), 0);
    assert_eq!(fallback.substitutions(), 2);
}

/// 读穿透加载失败时使用降级值，降级值不写入缓存
#[tokio::test]
async fn test_fallback_around_remember() {
    let (manager, _fast, _slow) = two_tier_manager();
    let key = "price:1".to_string();
    let fallback = FallbackExecutor::<String, String>::new()
        .on(ErrorKind::Upstream, |_, key| format!("placeholder:{}", key));

    let result = fallback
        .execute(
            || {
                manager.remember(&key, None, || async {
                    Err(CacheError::Upstream("pricing service down".to_string()))
                })
            },
            &key,
        )
        .await;
    assert_eq!(result.unwrap(), "placeholder:price:1");
    assert_eq!(manager.get(&key).await.unwrap(), None);
}

/// 没有匹配处理器时返回原始错误
#[tokio::test]
async fn test_unhandled_error_is_reraised() {
    let fallback = FallbackExecutor::<String>::new().value_for(ErrorKind::Timeout, "t".to_string());

    let result = fallback
        .execute(|| async { Err(CacheError::NotFound("k".to_string())) }, &())
        .await;
    assert!(matches!(result, Err(CacheError::NotFound(_))));
    assert_eq!(fallback.substitutions(), 0);
    assert!(!fallback.handles(ErrorKind::NotFound));
}

/// 运行时注册默认处理器
#[tokio::test]
async fn test_register_default_handler() {
    let mut fallback = FallbackExecutor::<String>::new();
    fallback.register(
        FallbackKey::Default,
        Arc::new(|err: &CacheError, _: &()| format!("default:{}", err.kind())),
    );

    let result = fallback
        .execute(|| async { Err(CacheError::Cancelled) }, &())
        .await;
    assert_eq!(result.unwrap(), "default:cancelled");
}
