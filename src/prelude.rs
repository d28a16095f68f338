//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Prelude module - Commonly used types for quick imports
//!
//! This module re-exports the most commonly used types from Cacheron,
//! allowing users to import them with a single `use cacheron::prelude::*;`
//! statement instead of importing each type individually.

// Core types - always available
pub use crate::cache::{MemoryStore, PromotionMode, TieredCacheManager, WriteReport};
pub use crate::config::CacheConfig;
pub use crate::error::{CacheError, CacheResultExt, ErrorKind, StorageError};
pub use crate::factory::StoreFactory;
pub use crate::storage::CacheStore;

// Resilience primitives
pub use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use crate::fallback::FallbackExecutor;
pub use crate::retry::{RetryConfig, RetryExecutor};

// Feature-gated exports
#[cfg(feature = "redis")]
pub use crate::cache::{RedisConfig, RedisStore};

#[cfg(feature = "monitoring")]
pub use crate::telemetry::Metrics;
