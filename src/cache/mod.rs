//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 缓存模块
//!
//! 提供缓存存储后端（内存、文件、Redis）、弹性存储装饰器以及分层缓存管理器。

pub mod file;
pub mod manager;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod resilient;

pub use file::FileStore;
pub use manager::{
    Layer, LayerOutcome, ManagerStatsSnapshot, PromotionMode, TieredCacheManager, WriteReport,
};
pub use memory::{CacheEntry, MemoryStats, MemoryStore, MemoryStoreConfig};
pub use resilient::ResilientStore;

#[cfg(feature = "redis")]
pub use self::redis::{RedisConfig, RedisStore};
