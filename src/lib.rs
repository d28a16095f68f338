//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Cacheron - Multi-Tier Cache with Resilience Primitives
//!
//! Provides a prioritized multi-tier cache with read-through promotion, plus
//! circuit breaking, retry with backoff, and error-kind based fallback.
//!
//! # API Layers
//!
//! ## Prelude (Quick Start)
//!
//! Use `use cacheron::prelude::*;` to import all commonly used types.
//!
//! ## Core API
//!
//! - [`TieredCacheManager`] - Multi-tier cache with promotion and single-flight loading
//! - [`CacheStore`] - Storage backend contract
//! - [`CircuitBreaker`] - Closed / Open / HalfOpen failure isolation
//! - [`RetryExecutor`] - Exponential backoff with jitter and cancellation
//! - [`FallbackExecutor`] - Substitute values by error kind
//! - [`CacheError`] - Error types
//!
//! ## Backends
//!
//! - [`MemoryStore`] - In-process LRU with TTL
//! - [`FileStore`] - One file per key on local disk
//! - `RedisStore` - Distributed tier (requires `redis` feature)
//! - [`ResilientStore`] - Wraps any backend with breaker + retry
//!
//! # Examples
//!
//! ```rust
//! use cacheron::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = TieredCacheManager::new().with_promotion_mode(PromotionMode::Inline);
//!     manager.add_layer("memory", Arc::new(MemoryStore::new(1000)), 10);
//!     manager.add_layer("backup", Arc::new(MemoryStore::new(10_000)), 1);
//!
//!     manager.set("user:1", "alice", None, Some(&["backup"])).await;
//!
//!     // 从低优先级层读出后提升到 memory
//!     let value = manager.get("user:1").await.unwrap();
//!     assert_eq!(value.as_deref(), Some("alice"));
//!     assert!(manager.has("user:1", Some("memory")).await.unwrap());
//! }
//! ```
//!
//! # Features
//!
//! - **Tiered lookup**: highest priority first, hits promoted into faster layers
//! - **Best-effort writes**: per-layer outcome report instead of all-or-nothing
//! - **Single-flight loading**: concurrent `remember` calls share one upstream fetch
//! - **Resilience**: circuit breaker, retry with jitter, typed fallback
//! - **Configuration**: YAML / TOML with human-readable durations
//! - **Monitoring**: Prometheus metrics and `tracing` logs

pub mod prelude;

pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod constants;
pub mod error;
pub mod factory;
pub mod fallback;
pub mod retry;
pub mod storage;
#[cfg(any(feature = "telemetry", feature = "monitoring"))]
pub mod telemetry;

// 重新导出常用类型
pub use cache::{
    FileStore, Layer, LayerOutcome, ManagerStatsSnapshot, MemoryStats, MemoryStore,
    MemoryStoreConfig, PromotionMode, ResilientStore, TieredCacheManager, WriteReport,
};
#[cfg(feature = "redis")]
pub use cache::{RedisConfig, RedisStore};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use config::{
    parse_duration, BackendConfig, BreakerSettings, CacheConfig, LayerConfig, ManagerConfig,
    RetrySettings,
};
pub use error::{
    CacheError, CacheResultExt, CircuitBreakerStats, CircuitState, ErrorKind, StorageError,
};
pub use factory::StoreFactory;
pub use fallback::{FallbackExecutor, FallbackHandler, FallbackKey};
pub use retry::{
    CancellationHandle, CancellationSignal, RetryConfig, RetryExecutor, RetryStatsSnapshot,
};
pub use storage::{validate_key, BulkResult, CacheStore, StoreStats};
#[cfg(feature = "telemetry")]
pub use telemetry::init_logging;
#[cfg(feature = "monitoring")]
pub use telemetry::Metrics;
