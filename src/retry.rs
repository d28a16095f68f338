//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 重试执行器
//!
//! 有界重试 + 指数退避 + 抖动。
//!
//! - 第 `n` 次重试前等待 `base_delay * multiplier^(n-1)`，再随机加减 25% 的抖动
//! - 错误种类不在白名单内时立即返回（白名单为空表示任何错误都重试）
//! - 重试耗尽后原样返回最后一次的错误
//! - 等待使用 `tokio::time::sleep`，不阻塞执行线程
//! - 每次等待前与每次重试前检查取消信号

use crate::constants::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_RETRIES, RETRY_JITTER_FACTOR,
};
use crate::error::{CacheError, ErrorKind};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

#[cfg(feature = "monitoring")]
use crate::telemetry::Metrics;

/// 重试配置
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// 首次尝试之后的最大重试次数
    pub max_retries: u32,
    /// 首次重试前的基础延迟
    pub base_delay: Duration,
    /// 退避倍数（≥1.0）
    pub backoff_multiplier: f64,
    /// 是否叠加 ±25% 抖动
    pub jitter: bool,
    /// 单次延迟上限
    pub max_delay: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: true,
            max_delay: None,
        }
    }
}

impl RetryConfig {
    /// 创建新的重试配置
    pub fn new(max_retries: u32, base_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_retries,
            base_delay,
            backoff_multiplier,
            ..Default::default()
        }
    }

    /// 设置是否启用抖动
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// 设置单次延迟上限
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }
}

/// 非加密随机源（用于抖动）
#[derive(Clone, Default)]
enum Rnd {
    #[default]
    Real,

    #[cfg(test)]
    Fixed(f64),
}

impl Rnd {
    /// `[0, 1)` 区间的随机数
    fn next_f64(&self) -> f64 {
        match self {
            Self::Real => fastrand::f64(),
            #[cfg(test)]
            Self::Fixed(value) => *value,
        }
    }
}

impl std::fmt::Debug for Rnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real => write!(f, "Real"),
            #[cfg(test)]
            Self::Fixed(v) => write!(f, "Fixed({})", v),
        }
    }
}

/// 取消句柄
///
/// 调用 [`cancel`](Self::cancel) 后，所有关联的 [`CancellationSignal`] 立即观察到取消。
#[derive(Debug)]
pub struct CancellationHandle {
    tx: watch::Sender<bool>,
}

impl CancellationHandle {
    /// 创建取消句柄及其信号
    pub fn pair() -> (Self, CancellationSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancellationSignal { rx: Some(rx) })
    }

    /// 发出取消
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// 派生新的信号
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            rx: Some(self.tx.subscribe()),
        }
    }
}

/// 取消信号（可克隆）
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancellationSignal {
    /// 永不取消的信号
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// 是否已取消
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// 等待取消；永不取消的信号永远挂起
    pub async fn cancelled(&mut self) {
        match self.rx.as_mut() {
            Some(rx) => {
                if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                    // 句柄已丢弃，不会再取消
                    std::future::pending::<()>().await;
                }
            }
            None => std::future::pending::<()>().await,
        }
    }
}

/// 重试统计信息
#[derive(Debug, Default)]
pub struct RetryStats {
    /// 执行次数（execute调用）
    pub executions: AtomicU64,
    /// 总尝试次数（含首次）
    pub attempts: AtomicU64,
    /// 重试次数
    pub retries: AtomicU64,
    /// 重试后成功的执行
    pub recovered: AtomicU64,
    /// 最终失败的执行
    pub exhausted: AtomicU64,
}

/// 重试统计快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RetryStatsSnapshot {
    pub executions: u64,
    pub attempts: u64,
    pub retries: u64,
    pub recovered: u64,
    pub exhausted: u64,
}

impl RetryStats {
    pub fn snapshot(&self) -> RetryStatsSnapshot {
        RetryStatsSnapshot {
            executions: self.executions.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            recovered: self.recovered.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
        }
    }
}

/// 重试执行器
///
/// 执行器不在多次 `execute` 之间共享状态（统计计数除外），可以被多个任务共享。
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    stats: Arc<RetryStats>,
    rnd: Rnd,
    #[cfg(feature = "monitoring")]
    metrics: Option<Arc<Metrics>>,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryExecutor {
    /// 创建重试执行器
    pub fn new(mut config: RetryConfig) -> Self {
        if config.backoff_multiplier.is_nan() || config.backoff_multiplier < 1.0 {
            warn!(
                "退避倍数 {} 小于1.0，按1.0处理",
                config.backoff_multiplier
            );
            config.backoff_multiplier = 1.0;
        }
        Self {
            config,
            stats: Arc::new(RetryStats::default()),
            rnd: Rnd::default(),
            #[cfg(feature = "monitoring")]
            metrics: None,
        }
    }

    /// 附加Prometheus指标
    #[cfg(feature = "monitoring")]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[cfg(test)]
    fn with_rnd(mut self, rnd: Rnd) -> Self {
        self.rnd = rnd;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn stats(&self) -> RetryStatsSnapshot {
        self.stats.snapshot()
    }

    /// 第 `attempt` 次重试前的延迟（attempt 从1开始）
    ///
    /// 不含抖动时为 `base_delay * multiplier^(attempt-1)`；
    /// 含抖动时随机加上或减去 `d*0.25`（符号等概率），结果不小于零。
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
        let mut delay =
            self.config.base_delay.as_secs_f64() * self.config.backoff_multiplier.powi(exponent);

        if let Some(max) = self.config.max_delay {
            delay = delay.min(max.as_secs_f64());
        }

        if self.config.jitter {
            let sign = if self.rnd.next_f64() < 0.5 { -1.0 } else { 1.0 };
            delay *= 1.0 + sign * RETRY_JITTER_FACTOR;
        }

        if !delay.is_finite() {
            return self.config.max_delay.unwrap_or(Duration::MAX);
        }
        // 按纳秒取整，避免浮点误差产生 199.999999ms 之类的值
        let nanos = (delay.max(0.0) * 1e9).round();
        if nanos >= u64::MAX as f64 {
            return Duration::from_nanos(u64::MAX);
        }
        Duration::from_nanos(nanos as u64)
    }

    /// 执行操作，失败时按配置重试
    ///
    /// `retryable` 为空表示任何错误都重试。
    pub async fn execute<F, Fut, T>(
        &self,
        operation: F,
        retryable: &[ErrorKind],
    ) -> Result<T, CacheError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        self.execute_with_cancel(operation, retryable, CancellationSignal::never())
            .await
    }

    /// 执行操作，只重试暂时性错误（后端不可用、超时、上游错误）
    pub async fn execute_transient<F, Fut, T>(&self, operation: F) -> Result<T, CacheError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        self.run(operation, CancellationSignal::never(), |e| e.is_transient())
            .await
    }

    /// 执行操作，支持取消
    pub async fn execute_with_cancel<F, Fut, T>(
        &self,
        operation: F,
        retryable: &[ErrorKind],
        cancel: CancellationSignal,
    ) -> Result<T, CacheError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        self.run(operation, cancel, |e| {
            retryable.is_empty() || retryable.contains(&e.kind())
        })
        .await
    }

    async fn run<F, Fut, T, P>(
        &self,
        mut operation: F,
        mut cancel: CancellationSignal,
        is_retryable: P,
    ) -> Result<T, CacheError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
        P: Fn(&CacheError) -> bool,
    {
        self.stats.executions.fetch_add(1, Ordering::Relaxed);
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                debug!("重试已取消");
                return Err(CacheError::Cancelled);
            }

            self.stats.attempts.fetch_add(1, Ordering::Relaxed);
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        self.stats.recovered.fetch_add(1, Ordering::Relaxed);
                        debug!(attempt, "重试成功");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !is_retryable(&error) {
                trace!(kind = %error.kind(), "错误不可重试，直接返回");
                return Err(error);
            }

            if attempt >= self.config.max_retries {
                self.stats.exhausted.fetch_add(1, Ordering::Relaxed);
                warn!(
                    attempts = attempt + 1,
                    error = %error,
                    "重试次数耗尽"
                );
                return Err(error);
            }

            attempt += 1;
            let delay = self.delay_for_attempt(attempt);
            debug!(
                attempt,
                max_retries = self.config.max_retries,
                delay_ms = delay.as_millis() as u64,
                kind = %error.kind(),
                "操作失败，准备重试"
            );

            if cancel.is_cancelled() {
                return Err(CacheError::Cancelled);
            }
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    debug!("等待重试时被取消");
                    return Err(CacheError::Cancelled);
                }
            }

            self.stats.retries.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "monitoring")]
            if let Some(metrics) = &self.metrics {
                metrics.record_retry(error.kind());
            }
        }
    }
}
