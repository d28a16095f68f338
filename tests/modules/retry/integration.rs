//! 重试模块集成测试

use crate::common::FlakyStore;
use cacheron::{
    error::{CacheError, ErrorKind},
    retry::{CancellationHandle, RetryConfig, RetryExecutor},
    storage::CacheStore,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn executor(max_retries: u32) -> RetryExecutor {
    RetryExecutor::new(RetryConfig::new(max_retries, Duration::from_millis(100), 2.0).jitter(false))
}

/// 后端恢复后重试成功
#[tokio::test(start_paused = true)]
async fn test_retry_until_backend_recovers() {
    let store = Arc::new(FlakyStore::new());
    store.set("k", "v", None).await.unwrap();
    store.set_down(true);

    let recover = {
        let store = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            store.set_down(false);
        })
    };

    let executor = executor(3);
    let value = executor
        .execute_transient(|| async { store.get("k").await.map_err(CacheError::from) })
        .await
        .unwrap();
    assert_eq!(value.as_deref(), Some("v"));
    recover.await.unwrap();

    // 0ms, 100ms, 300ms 三次尝试（第三次时后端已恢复）
    let stats = executor.stats();
    assert_eq!(stats.attempts, 3);
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.recovered, 1);
}

/// 白名单之外的错误不重试
#[tokio::test]
async fn test_non_retryable_error_fails_fast() {
    let calls = AtomicU32::new(0);
    let result: Result<(), _> = executor(5)
        .execute(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CacheError::NotFound("user:1".to_string())) }
            },
            &[ErrorKind::Timeout],
        )
        .await;

    assert!(matches!(result, Err(CacheError::NotFound(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// 重试耗尽后返回最后一次的错误
#[tokio::test(start_paused = true)]
async fn test_exhausted_returns_last_error() {
    let calls = AtomicU32::new(0);
    let executor = executor(2);
    let result: Result<(), _> = executor
        .execute(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(CacheError::Upstream(format!("attempt {}", n))) }
            },
            &[],
        )
        .await;

    assert!(matches!(result, Err(CacheError::Upstream(msg)) if msg == "attempt 2"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(executor.stats().exhausted, 1);
}

/// 等待重试时取消
#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff() {
    let executor = Arc::new(
        RetryExecutor::new(RetryConfig::new(10, Duration::from_secs(10), 2.0).jitter(false)),
    );
    let (handle, signal) = CancellationHandle::pair();
    let calls = Arc::new(AtomicU32::new(0));

    let task = {
        let executor = executor.clone();
        let calls = calls.clone();
        tokio::spawn(async move {
            executor
                .execute_with_cancel(
                    || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async { Err::<(), _>(CacheError::backend_unavailable("down")) }
                    },
                    &[],
                    signal,
                )
                .await
        })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.cancel();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(CacheError::Cancelled)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// 退避延迟序列
#[test]
fn test_backoff_sequence_with_cap() {
    let executor = RetryExecutor::new(
        RetryConfig::new(5, Duration::from_millis(100), 2.0)
            .jitter(false)
            .max_delay(Duration::from_millis(500)),
    );
    let delays: Vec<u128> = (1..=5)
        .map(|n| executor.delay_for_attempt(n).as_millis())
        .collect();
    assert_eq!(delays, vec![100, 200, 400, 500, 500]);
}

/// 抖动范围
#[test]
fn test_jitter_bounds() {
    let executor = RetryExecutor::new(RetryConfig::new(3, Duration::from_millis(200), 2.0));
    for _ in 0..200 {
        let delay = executor.delay_for_attempt(1);
        assert!(delay >= Duration::from_millis(150), "{:?}", delay);
        assert!(delay <= Duration::from_millis(250), "{:?}", delay);
    }
}
