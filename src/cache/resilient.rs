//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 弹性存储装饰器
//!
//! 用熔断器与重试执行器包装任意 [`CacheStore`]：
//! 熔断器在外层，每次操作（含其内部的全部重试）只计一次成败；
//! 重试只针对暂时性错误（后端不可用、超时）。

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::circuit_breaker::CircuitBreaker;
use crate::error::{CacheError, StorageError};
use crate::retry::RetryExecutor;
use crate::storage::{CacheStore, StoreStats};

/// 把装饰器层的错误还原为存储错误
///
/// 熔断拒绝对上层而言等同于后端不可用。
fn into_storage_error(err: CacheError) -> StorageError {
    match err {
        CacheError::Storage(e) => e,
        other => StorageError::BackendUnavailable(other.to_string()),
    }
}

/// 弹性存储
pub struct ResilientStore {
    inner: Arc<dyn CacheStore>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryExecutor,
}

impl ResilientStore {
    /// 创建弹性存储
    pub fn new(
        inner: Arc<dyn CacheStore>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryExecutor,
    ) -> Self {
        Self {
            inner,
            breaker,
            retry,
        }
    }

    /// 被包装的存储
    pub fn inner(&self) -> &Arc<dyn CacheStore> {
        &self.inner
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn retry(&self) -> &RetryExecutor {
        &self.retry
    }

    async fn guarded<T, F, Fut>(&self, mut op: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        self.breaker
            .execute(|| {
                self.retry
                    .execute_transient(|| {
                        let fut = op();
                        async move { fut.await.map_err(CacheError::from) }
                    })
            })
            .await
            .map_err(into_storage_error)
    }
}

#[async_trait]
impl CacheStore for ResilientStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.guarded(|| self.inner.get(key)).await
    }

    async fn get_with_ttl(
        &self,
        key: &str,
    ) -> Result<Option<(String, Option<Duration>)>, StorageError> {
        self.guarded(|| self.inner.get_with_ttl(key)).await
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError> {
        self.guarded(|| self.inner.set(key, value, ttl)).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        self.guarded(|| self.inner.delete(key)).await
    }

    async fn has(&self, key: &str) -> Result<bool, StorageError> {
        self.guarded(|| self.inner.has(key)).await
    }

    async fn clear(&self) -> Result<bool, StorageError> {
        self.guarded(|| self.inner.clear()).await
    }

    fn stats(&self) -> StoreStats {
        let mut stats = self.inner.stats();
        let breaker = self.breaker.get_stats();
        stats.insert("breaker_state".into(), breaker.state.to_string().into());
        stats.insert("breaker_rejected_calls".into(), breaker.rejected_calls.into());
        stats.insert("retries".into(), self.retry.stats().retries.into());
        stats
    }
}
