//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 监控与日志模块
//!
//! # 功能
//!
//! - `telemetry` 特性：基于 `tracing-subscriber` 的日志初始化，支持 `RUST_LOG` 覆盖
//! - `monitoring` 特性：Prometheus指标（命中、未命中、提升、写失败、熔断、重试、查找延迟）
//!
//! # 示例
//!
//! ```rust,ignore
//! use cacheron::telemetry::{init_logging, Metrics};
//! use std::sync::Arc;
//!
//! init_logging("cacheron=debug").ok();
//! let metrics = Arc::new(Metrics::new()?);
//! let manager = cacheron::TieredCacheManager::new().with_metrics(Arc::clone(&metrics));
//! println!("{}", metrics.gather());
//! ```

#[cfg(feature = "telemetry")]
use crate::error::CacheError;

/// 初始化日志订阅者
///
/// 优先使用环境变量 `RUST_LOG`，否则使用传入的过滤规则。
/// 重复初始化返回 `Config` 错误，不会 panic。
#[cfg(feature = "telemetry")]
pub fn init_logging(default_filter: &str) -> Result<(), CacheError> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| CacheError::Config(format!("日志过滤规则无效: {}", e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| CacheError::Config(format!("日志订阅者初始化失败: {}", e)))?;

    tracing::info!("日志系统初始化完成");
    Ok(())
}

#[cfg(feature = "monitoring")]
pub use metrics::Metrics;

#[cfg(feature = "monitoring")]
mod metrics {
    use crate::error::{CircuitState, ErrorKind};
    use prometheus::{
        Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
    };
    use std::time::Duration;
    use tracing::error;

    /// 查找延迟的直方图桶（秒）
    const LOOKUP_BUCKETS: &[f64] = &[
        0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
    ];

    /// Prometheus指标
    ///
    /// 每个实例持有独立的 [`Registry`]，可以在同一进程中创建多个实例（例如测试）。
    #[derive(Clone)]
    pub struct Metrics {
        /// 各层命中次数
        pub hits: IntCounterVec,
        /// 所有层均未命中的次数
        pub misses: IntCounter,
        /// 各层接收提升写入的次数
        pub promotions: IntCounterVec,
        /// 各层提升写入失败次数
        pub promotion_failures: IntCounterVec,
        /// 各层写入失败次数
        pub write_failures: IntCounterVec,
        /// 熔断拒绝次数
        pub breaker_rejections: IntCounterVec,
        /// 熔断状态转换次数
        pub breaker_transitions: IntCounterVec,
        /// 重试次数（按错误种类）
        pub retries: IntCounterVec,
        /// 查找延迟
        pub lookup_duration: Histogram,
        registry: Registry,
    }

    impl Metrics {
        /// 创建并注册所有指标
        pub fn new() -> Result<Self, prometheus::Error> {
            let registry = Registry::new();

            let hits = IntCounterVec::new(
                Opts::new("cacheron_hits_total", "Cache hits per layer"),
                &["layer"],
            )?;
            let misses = IntCounter::with_opts(Opts::new(
                "cacheron_misses_total",
                "Lookups that missed every layer",
            ))?;
            let promotions = IntCounterVec::new(
                Opts::new("cacheron_promotions_total", "Values promoted into a layer"),
                &["layer"],
            )?;
            let promotion_failures = IntCounterVec::new(
                Opts::new(
                    "cacheron_promotion_failures_total",
                    "Failed promotion writes per layer",
                ),
                &["layer"],
            )?;
            let write_failures = IntCounterVec::new(
                Opts::new("cacheron_write_failures_total", "Failed writes per layer"),
                &["layer"],
            )?;
            let breaker_rejections = IntCounterVec::new(
                Opts::new(
                    "cacheron_breaker_rejections_total",
                    "Calls rejected by an open circuit breaker",
                ),
                &["breaker"],
            )?;
            let breaker_transitions = IntCounterVec::new(
                Opts::new(
                    "cacheron_breaker_transitions_total",
                    "Circuit breaker state transitions",
                ),
                &["breaker", "state"],
            )?;
            let retries = IntCounterVec::new(
                Opts::new("cacheron_retries_total", "Retries by failure kind"),
                &["kind"],
            )?;
            let lookup_duration = Histogram::with_opts(
                HistogramOpts::new("cacheron_lookup_duration_seconds", "Tiered lookup latency")
                    .buckets(LOOKUP_BUCKETS.to_vec()),
            )?;

            registry.register(Box::new(hits.clone()))?;
            registry.register(Box::new(misses.clone()))?;
            registry.register(Box::new(promotions.clone()))?;
            registry.register(Box::new(promotion_failures.clone()))?;
            registry.register(Box::new(write_failures.clone()))?;
            registry.register(Box::new(breaker_rejections.clone()))?;
            registry.register(Box::new(breaker_transitions.clone()))?;
            registry.register(Box::new(retries.clone()))?;
            registry.register(Box::new(lookup_duration.clone()))?;

            Ok(Self {
                hits,
                misses,
                promotions,
                promotion_failures,
                write_failures,
                breaker_rejections,
                breaker_transitions,
                retries,
                lookup_duration,
                registry,
            })
        }

        /// 指标所在的Registry
        pub fn registry(&self) -> &Registry {
            &self.registry
        }

        /// 收集所有指标并返回Prometheus格式的文本
        pub fn gather(&self) -> String {
            let encoder = TextEncoder::new();
            let metric_families = self.registry.gather();
            let mut buffer = Vec::new();
            if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                error!("指标编码失败: {}", e);
                return String::new();
            }
            String::from_utf8(buffer).unwrap_or_default()
        }

        pub fn record_hit(&self, layer: &str) {
            self.hits.with_label_values(&[layer]).inc();
        }

        pub fn record_miss(&self) {
            self.misses.inc();
        }

        pub fn record_promotion(&self, layer: &str) {
            self.promotions.with_label_values(&[layer]).inc();
        }

        pub fn record_promotion_failure(&self, layer: &str) {
            self.promotion_failures.with_label_values(&[layer]).inc();
        }

        pub fn record_write_failure(&self, layer: &str) {
            self.write_failures.with_label_values(&[layer]).inc();
        }

        pub fn record_breaker_rejection(&self, breaker: &str) {
            self.breaker_rejections.with_label_values(&[breaker]).inc();
        }

        pub fn record_breaker_transition(&self, breaker: &str, to: CircuitState) {
            let state = to.to_string();
            self.breaker_transitions
                .with_label_values(&[breaker, state.as_str()])
                .inc();
        }

        pub fn record_retry(&self, kind: ErrorKind) {
            self.retries.with_label_values(&[kind.as_str()]).inc();
        }

        /// 记录一次分层查找的耗时
        pub fn observe_lookup(&self, duration: Duration) {
            self.lookup_duration.observe(duration.as_secs_f64());
        }
    }

    impl std::fmt::Debug for Metrics {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Metrics")
                .field("misses", &self.misses.get())
                .finish_non_exhaustive()
        }
    }

}
