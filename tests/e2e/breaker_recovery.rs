//! 端到端测试：熔断与恢复
//!
//! 测试场景：
//! 1. 熔断器阈值1，超时1秒
//! 2. 一次失败后进入打开状态
//! 3. 立即再次调用被拒绝（CircuitOpen）
//! 4. 1.1秒后成功调用，恢复关闭且失败计数归零

use cacheron::{
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig},
    error::{CacheError, CircuitState},
};
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test]
async fn test_breaker_opens_and_recovers() {
    let breaker = CircuitBreaker::new("e2e", CircuitBreakerConfig::new(1, Duration::from_secs(1)));

    let result = breaker
        .execute(|| async { Err::<String, _>(CacheError::backend_unavailable("boom")) })
        .await;
    assert!(result.is_err());
    assert_eq!(breaker.state(), CircuitState::Open);

    let result = breaker
        .execute(|| async { Ok::<_, CacheError>("never runs".to_string()) })
        .await;
    assert!(matches!(result, Err(CacheError::CircuitOpen(_))));

    sleep(Duration::from_millis(1100)).await;

    let result = breaker
        .execute(|| async { Ok::<_, CacheError>("recovered".to_string()) })
        .await;
    assert_eq!(result.unwrap(), "recovered");
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);
}
