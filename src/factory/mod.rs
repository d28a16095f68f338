//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 存储工厂模块
//!
//! 根据 [`CacheConfig`] 创建存储后端并组装分层缓存管理器。
//!
//! # 特性
//!
//! - **统一创建接口** - 通过配置动态创建内存、文件、Redis存储
//! - **弹性包装** - `resilient: true` 的层自动套上熔断器与重试
//! - **错误处理** - 创建失败时指明出错的层

use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{FileStore, MemoryStore, MemoryStoreConfig, ResilientStore, TieredCacheManager};
use crate::circuit_breaker::CircuitBreaker;
use crate::config::{parse_duration, BackendConfig, CacheConfig, LayerConfig};
use crate::error::CacheError;
use crate::retry::RetryExecutor;
use crate::storage::CacheStore;
#[cfg(feature = "monitoring")]
use crate::telemetry::Metrics;

/// 存储工厂
///
/// # 示例
///
/// ```rust,ignore
/// use cacheron::config::CacheConfig;
/// use cacheron::factory::StoreFactory;
///
/// let config = CacheConfig::load("cache.yaml").await?;
/// let manager = StoreFactory::new().build_manager(&config).await?;
/// ```
#[derive(Default)]
pub struct StoreFactory {
    #[cfg(feature = "monitoring")]
    metrics: Option<Arc<Metrics>>,
}

impl StoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让创建出的管理器、熔断器与重试执行器共享同一组指标
    #[cfg(feature = "monitoring")]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// 从层配置创建存储
    ///
    /// 内存存储会启动后台过期清理任务，因此需要在tokio运行时中调用。
    pub async fn create_store(
        &self,
        layer: &LayerConfig,
        config: &CacheConfig,
    ) -> Result<Arc<dyn CacheStore>, CacheError> {
        let store = Self::create_backend(&layer.backend).await?;
        if !layer.resilient {
            return Ok(store);
        }

        let breaker = CircuitBreaker::new(layer.name.clone(), config.circuit_breaker.to_config()?);
        let retry = RetryExecutor::new(config.retry.to_config()?);
        #[cfg(feature = "monitoring")]
        let (breaker, retry) = match &self.metrics {
            Some(metrics) => (
                breaker.with_metrics(Arc::clone(metrics)),
                retry.with_metrics(Arc::clone(metrics)),
            ),
            None => (breaker, retry),
        };

        debug!("缓存层 {} 启用熔断与重试", layer.name);
        Ok(Arc::new(ResilientStore::new(store, Arc::new(breaker), retry)))
    }

    /// 根据后端配置创建裸存储
    pub async fn create_backend(
        backend: &BackendConfig,
    ) -> Result<Arc<dyn CacheStore>, CacheError> {
        match backend {
            BackendConfig::Memory {
                capacity,
                default_ttl,
            } => {
                let mut store_config = MemoryStoreConfig::new().capacity(*capacity);
                if let Some(ttl) = default_ttl {
                    store_config =
                        store_config.default_ttl(parse_duration(ttl).map_err(CacheError::Config)?);
                }
                let store = Arc::new(MemoryStore::with_config(store_config));
                store.start_cleanup();
                Ok(store)
            }
            BackendConfig::File { dir } => Ok(Arc::new(FileStore::new(dir).await?)),
            #[cfg(feature = "redis")]
            BackendConfig::Redis {
                url,
                db,
                password,
                key_prefix,
            } => {
                use crate::cache::{RedisConfig, RedisStore};

                let mut redis_config = RedisConfig::new(url.clone()).db(*db);
                if let Some(password) = password {
                    redis_config = redis_config.password(password.clone());
                }
                if let Some(prefix) = key_prefix {
                    redis_config = redis_config.key_prefix(prefix.clone());
                }
                Ok(Arc::new(RedisStore::connect(redis_config).await?))
            }
            #[cfg(not(feature = "redis"))]
            BackendConfig::Redis { .. } => Err(CacheError::Config(
                "Redis存储需要启用 redis 特性".to_string(),
            )),
        }
    }

    /// 按配置组装分层缓存管理器
    pub async fn build_manager(
        &self,
        config: &CacheConfig,
    ) -> Result<TieredCacheManager, CacheError> {
        config.validate().map_err(CacheError::Config)?;

        let mut manager =
            TieredCacheManager::new().with_promotion_mode(config.manager.promotion_mode);
        if let Some(ttl) = config.manager.default_ttl()? {
            manager = manager.with_default_ttl(ttl);
        }
        #[cfg(feature = "monitoring")]
        if let Some(metrics) = &self.metrics {
            manager = manager.with_metrics(Arc::clone(metrics));
        }

        for (index, layer) in config.layers.iter().enumerate() {
            let store = self.create_store(layer, config).await.map_err(|e| {
                CacheError::Config(format!(
                    "创建第 {} 个缓存层 {} 失败: {}",
                    index + 1,
                    layer.name,
                    e
                ))
            })?;
            manager.add_layer(layer.name.clone(), store, layer.priority);
        }

        info!("分层缓存管理器创建完成, 层数: {}", config.layers.len());
        Ok(manager)
    }
}

// ============================================================================
// 单元测试
// ============================================================================
