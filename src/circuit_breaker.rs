//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 熔断器实现
//!
//! 提供熔断器功能，支持三状态转换和自动恢复。
//!
//! # 特性
//!
//! - **三状态**: Closed（关闭）、Open（打开）、HalfOpen（半开）
//! - **自动熔断**: 连续失败次数达到阈值自动熔断
//! - **单次探测**: 超时后第一个调用成为唯一的探测调用，其余并发调用被拒绝
//! - **线程安全**: 所有状态转换都在同一把锁下完成
//! - **统计信息**: 提供详细的统计信息
//!
//! 熔断器从不改写被包装操作的错误：操作失败时原样返回原始错误，
//! 只有被拒绝的调用才返回 [`CacheError::CircuitOpen`]。

use crate::constants::{
    DEFAULT_CIRCUIT_BREAKER_FAILURE_THRESHOLD, DEFAULT_CIRCUIT_BREAKER_TIMEOUT_SECS,
};
use crate::error::{CacheError, CircuitBreakerStats, CircuitState};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "monitoring")]
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

#[cfg(feature = "monitoring")]
use crate::telemetry::Metrics;

/// 熔断器配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// 失败阈值（连续失败达到此值时熔断，最小为1）
    pub failure_threshold: u64,
    /// 超时时间（最后一次失败后等待此时间再放行探测调用）
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_CIRCUIT_BREAKER_FAILURE_THRESHOLD,
            timeout: Duration::from_secs(DEFAULT_CIRCUIT_BREAKER_TIMEOUT_SECS),
        }
    }
}

impl CircuitBreakerConfig {
    /// 创建新的熔断器配置
    pub fn new(failure_threshold: u64, timeout: Duration) -> Self {
        Self {
            failure_threshold,
            timeout,
        }
    }

    /// 设置失败阈值
    pub fn failure_threshold(mut self, threshold: u64) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// 设置超时时间
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// 锁内的可变状态
#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// 连续失败次数
    failure_count: u64,
    last_failure: Option<Instant>,
    last_failure_time: Option<DateTime<Utc>>,
    last_state_change: Option<DateTime<Utc>>,
    /// 半开状态下是否已有探测调用在执行
    trial_in_flight: bool,
}

/// 调用许可的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial,
}

/// 探测许可守卫
///
/// 探测调用的 future 在完成前被丢弃时，释放探测名额，
/// 熔断器保持半开，下一个调用重新成为探测调用。
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut inner = self.breaker.inner.lock();
            if inner.state == CircuitState::HalfOpen {
                inner.trial_in_flight = false;
            }
            debug!(breaker = %self.breaker.name, "探测调用被取消，释放探测名额");
        }
    }
}

/// 熔断器
pub struct CircuitBreaker {
    /// 熔断器名称（用于日志和拒绝错误）
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    /// 成功次数
    success_count: AtomicU64,
    /// 总调用次数
    total_calls: AtomicU64,
    /// 被拒绝的调用次数
    rejected_calls: AtomicU64,
    #[cfg(feature = "monitoring")]
    metrics: Option<Arc<Metrics>>,
}

impl CircuitBreaker {
    /// 创建新的熔断器
    ///
    /// # 参数
    /// - `name`: 熔断器名称，出现在日志与 `CircuitOpen` 错误中
    /// - `config`: 熔断器配置
    ///
    /// # 示例
    /// ```rust
    /// use cacheron::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
    /// use std::time::Duration;
    ///
    /// let config = CircuitBreakerConfig::new(5, Duration::from_secs(60));
    /// let breaker = CircuitBreaker::new("user-service", config);
    /// ```
    pub fn new(name: impl Into<String>, mut config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        if config.failure_threshold == 0 {
            warn!(breaker = %name, "失败阈值为0，按1处理");
            config.failure_threshold = 1;
        }
        info!(
            "创建熔断器 {}: failure_threshold={}, timeout={:?}",
            name, config.failure_threshold, config.timeout
        );

        Self {
            name,
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                last_failure_time: None,
                last_state_change: Some(Utc::now()),
                trial_in_flight: false,
            }),
            success_count: AtomicU64::new(0),
            total_calls: AtomicU64::new(0),
            rejected_calls: AtomicU64::new(0),
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

    /// 熔断器名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 执行操作，自动处理熔断逻辑
    ///
    /// # 返回
    /// - `Ok(T)`: 操作成功
    /// - `Err(CacheError::CircuitOpen)`: 熔断器拒绝，操作未被调用
    /// - `Err(e)`: 操作本身的错误，原样返回
    ///
    /// # 示例
    /// ```rust
    /// use cacheron::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let breaker = CircuitBreaker::new("db", CircuitBreakerConfig::default());
    ///
    /// let result = breaker.execute(|| async {
    ///     Ok::<_, cacheron::error::CacheError>(42)
    /// }).await;
    /// assert_eq!(result.unwrap(), 42);
    /// # }
    /// ```
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        let admission = self.admit()?;
        let mut guard = TrialGuard {
            breaker: self,
            armed: admission == Admission::Trial,
        };

        let result = operation().await;
        guard.armed = false;

        match &result {
            Ok(_) => self.on_success(admission),
            Err(e) => self.on_failure(admission, e),
        }
        result
    }

    /// 判定是否放行当前调用
    fn admit(&self) -> Result<Admission, CacheError> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map_or(true, |at| at.elapsed() >= self.config.timeout);
                if elapsed {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.trial_in_flight = true;
                    debug!(breaker = %self.name, "放行探测调用");
                    Ok(Admission::Trial)
                } else {
                    drop(inner);
                    Err(self.reject())
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    drop(inner);
                    Err(self.reject())
                } else {
                    inner.trial_in_flight = true;
                    debug!(breaker = %self.name, "放行探测调用");
                    Ok(Admission::Trial)
                }
            }
        }
    }

    fn reject(&self) -> CacheError {
        self.rejected_calls.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "monitoring")]
        if let Some(metrics) = &self.metrics {
            metrics.record_breaker_rejection(&self.name);
        }
        warn!(breaker = %self.name, "熔断器打开，拒绝请求");
        CacheError::CircuitOpen(self.name.clone())
    }

    /// 操作成功时的处理
    fn on_success(&self, admission: Admission) {
        self.success_count.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();

        match (admission, inner.state) {
            (Admission::Trial, CircuitState::HalfOpen) => {
                inner.failure_count = 0;
                inner.trial_in_flight = false;
                self.transition(&mut inner, CircuitState::Closed);
            }
            (_, CircuitState::Closed) => {
                inner.failure_count = 0;
                trace!(breaker = %self.name, "操作成功（关闭状态）");
            }
            (_, state) => {
                trace!(breaker = %self.name, %state, "迟到的成功结果，忽略");
            }
        }
    }

    /// 操作失败时的处理
    fn on_failure(&self, admission: Admission, error: &CacheError) {
        let mut inner = self.inner.lock();

        match (admission, inner.state) {
            (Admission::Trial, CircuitState::HalfOpen) => {
                inner.trial_in_flight = false;
                inner.last_failure = Some(Instant::now());
                inner.last_failure_time = Some(Utc::now());
                warn!(breaker = %self.name, error = %error, "探测调用失败，重新熔断");
                self.transition(&mut inner, CircuitState::Open);
            }
            (_, CircuitState::Closed) => {
                inner.failure_count += 1;
                inner.last_failure = Some(Instant::now());
                inner.last_failure_time = Some(Utc::now());

                if inner.failure_count >= self.config.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                } else {
                    trace!(
                        breaker = %self.name,
                        "操作失败（关闭状态）: {}/{}",
                        inner.failure_count,
                        self.config.failure_threshold
                    );
                }
            }
            (_, state) => {
                // 熔断前放行的调用在打开后才失败，只记录日志
                debug!(breaker = %self.name, %state, error = %error, "迟到的失败结果，不影响状态");
            }
        }
    }

    /// 状态转换，调用方必须持有锁
    fn transition(&self, inner: &mut BreakerInner, to: CircuitState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        inner.last_state_change = Some(Utc::now());

        match to {
            CircuitState::Open => warn!(
                breaker = %self.name,
                "熔断器状态变更: {} -> Open (failure_count={})",
                from,
                inner.failure_count
            ),
            _ => info!(breaker = %self.name, "熔断器状态变更: {} -> {}", from, to),
        }

        #[cfg(feature = "monitoring")]
        if let Some(metrics) = &self.metrics {
            metrics.record_breaker_transition(&self.name, to);
        }
    }

    /// 检查熔断器是否打开
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// 检查熔断器是否关闭
    pub fn is_closed(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// 获取当前状态
    ///
    /// 超时已过但尚无调用时仍报告 `Open`，转换发生在下一次调用时。
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// 当前连续失败次数
    pub fn failure_count(&self) -> u64 {
        self.inner.lock().failure_count
    }

    /// 重置熔断器到关闭状态
    pub fn reset(&self) {
        info!(breaker = %self.name, "重置熔断器");
        let mut inner = self.inner.lock();
        inner.failure_count = 0;
        inner.last_failure = None;
        inner.last_failure_time = None;
        inner.trial_in_flight = false;
        self.transition(&mut inner, CircuitState::Closed);
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.lock();
        CircuitBreakerStats {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: self.success_count.load(Ordering::Relaxed),
            rejected_calls: self.rejected_calls.load(Ordering::Relaxed),
            total_calls: self.total_calls.load(Ordering::Relaxed),
            last_failure_time: inner.last_failure_time,
            last_state_change: inner.last_state_change,
        }
    }

    /// 获取配置
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new("default", CircuitBreakerConfig::default())
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}
