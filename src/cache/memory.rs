//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 内存存储实现
//!
//! 进程内缓存层，使用 `lru::LruCache` 实现容量上限与自动淘汰，支持TTL。
//!
//! # 特性
//!
//! - **TTL管理**: 读取时惰性过期，可选的后台清理任务
//! - **LRU淘汰**: 达到容量时淘汰最少使用的数据
//! - **统计信息**: 命中、未命中、过期、淘汰、写入次数
//!
//! # 使用示例
//!
//! ```no_run
//! use cacheron::cache::MemoryStore;
//! use cacheron::storage::CacheStore;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new(10_000);
//!
//!     store.set("key1", "value1", Some(Duration::from_secs(30))).await.unwrap();
//!
//!     if let Some(value) = store.get("key1").await.unwrap() {
//!         println!("Value: {}", value);
//!     }
//! }
//! ```

use async_trait::async_trait;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::constants::{DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_MEMORY_CAPACITY};
use crate::error::StorageError;
use crate::storage::{normalize_ttl, validate_key, CacheStore, StoreStats};

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// 缓存值
    pub value: String,
    /// 过期时间（None表示永不过期）
    pub expires_at: Option<Instant>,
}

impl CacheEntry {
    /// 创建新的缓存条目
    ///
    /// TTL大到无法表示为时间点时按永不过期处理。
    pub fn new(value: String, ttl: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            value,
            expires_at: ttl.and_then(|d| now.checked_add(d)),
        }
    }

    /// 检查是否过期
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Instant::now() >= expires_at,
            None => false,
        }
    }

    /// 剩余存活时间（None表示永不过期）
    pub fn remaining_ttl(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}

/// 内存存储配置
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// 缓存容量
    pub capacity: usize,
    /// 默认TTL（调用方未指定TTL时使用）
    pub default_ttl: Option<Duration>,
    /// 后台清理间隔
    pub cleanup_interval: Duration,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_MEMORY_CAPACITY,
            default_ttl: None,
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
        }
    }
}

impl MemoryStoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

/// 内存存储统计信息
#[derive(Debug, Default)]
pub struct MemoryStats {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
    writes: AtomicU64,
}

impl MemoryStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }
}

/// 内存存储
pub struct MemoryStore {
    /// 缓存数据（使用 LRU Cache 实现自动淘汰）
    data: parking_lot::Mutex<lru::LruCache<String, CacheEntry>>,
    /// 配置
    config: MemoryStoreConfig,
    /// 统计信息
    stats: MemoryStats,
    /// 清理任务句柄
    cleanup_handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl MemoryStore {
    /// 创建新的内存存储
    ///
    /// # 参数
    ///
    /// * `capacity` - 缓存容量，0 按 1 处理
    pub fn new(capacity: usize) -> Self {
        Self::with_config(MemoryStoreConfig::new().capacity(capacity))
    }

    /// 使用配置创建内存存储
    pub fn with_config(config: MemoryStoreConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            data: parking_lot::Mutex::new(lru::LruCache::new(capacity)),
            config,
            stats: MemoryStats::default(),
            cleanup_handle: parking_lot::Mutex::new(None),
        }
    }

    /// 启动后台清理任务
    ///
    /// 任务只持有弱引用，存储被释放后自动退出。需要在tokio运行时中调用。
    pub fn start_cleanup(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let interval = self.config.cleanup_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // 第一次 tick 立即完成
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(store) => {
                        store.cleanup_expired();
                    }
                    None => break,
                }
            }
        });

        if let Some(old) = self.cleanup_handle.lock().replace(handle) {
            old.abort();
        }
    }

    /// 停止清理任务
    pub fn shutdown(&self) {
        if let Some(handle) = self.cleanup_handle.lock().take() {
            handle.abort();
        }
    }

    /// 清理过期数据
    pub fn cleanup_expired(&self) -> usize {
        let mut cache = self.data.lock();

        let expired_keys: Vec<String> = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();
        for key in expired_keys {
            cache.pop(&key);
            self.stats.expirations.fetch_add(1, Ordering::Relaxed);
        }

        if count > 0 {
            debug!("清理了 {} 条过期数据", count);
        }

        count
    }

    /// 查找未过期的条目，过期条目顺带移除
    fn lookup(&self, key: &str) -> Option<(String, Option<Duration>)> {
        let mut cache = self.data.lock();
        let expired = match cache.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Some((entry.value.clone(), entry.remaining_ttl()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            cache.pop(key);
            self.stats.expirations.fetch_add(1, Ordering::Relaxed);
            trace!(key, "内存条目已过期");
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// 当前条目数（含尚未清理的过期条目）
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }

    /// 获取统计信息
    pub fn memory_stats(&self) -> &MemoryStats {
        &self.stats
    }

    /// 获取配置
    pub fn config(&self) -> &MemoryStoreConfig {
        &self.config
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_config(MemoryStoreConfig::default())
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        if let Some(handle) = self.cleanup_handle.get_mut().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lookup(key).map(|(value, _)| value))
    }

    async fn get_with_ttl(
        &self,
        key: &str,
    ) -> Result<Option<(String, Option<Duration>)>, StorageError> {
        Ok(self.lookup(key))
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError> {
        validate_key(key)?;
        let ttl = normalize_ttl(ttl).or(self.config.default_ttl);
        let entry = CacheEntry::new(value.to_string(), ttl);

        let mut cache = self.data.lock();
        if let Some((evicted, _)) = cache.push(key.to_string(), entry) {
            // push 在键已存在时返回旧值，此时不算淘汰
            if evicted != key {
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                trace!(evicted = %evicted, "LRU淘汰");
            }
        }
        self.stats.writes.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let mut cache = self.data.lock();
        Ok(match cache.pop(key) {
            Some(entry) => !entry.is_expired(),
            None => false,
        })
    }

    async fn has(&self, key: &str) -> Result<bool, StorageError> {
        let cache = self.data.lock();
        Ok(cache.peek(key).is_some_and(|entry| !entry.is_expired()))
    }

    async fn clear(&self) -> Result<bool, StorageError> {
        self.data.lock().clear();
        Ok(true)
    }

    fn stats(&self) -> StoreStats {
        let mut stats = StoreStats::new();
        stats.insert("entries".into(), self.len().into());
        stats.insert("capacity".into(), self.config.capacity.into());
        stats.insert("hits".into(), self.stats.hits().into());
        stats.insert("misses".into(), self.stats.misses().into());
        stats.insert("expirations".into(), self.stats.expirations().into());
        stats.insert("evictions".into(), self.stats.evictions().into());
        stats.insert("writes".into(), self.stats.writes().into());
        stats.insert("hit_rate".into(), self.stats.hit_rate().into());
        stats
    }
}
