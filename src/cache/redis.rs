//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Redis存储实现
//!
//! 分布式缓存层，是 `redis` 驱动的薄翻译层：驱动错误被翻译为 [`StorageError`]，
//! 不向外泄露驱动的错误类型。
//!
//! # 特性
//!
//! - **连接管理**: 使用ConnectionManager自动重连
//! - **键前缀**: 所有键都加前缀，`clear()` 只删除本存储前缀下的键
//! - **IO超时**: 每个命令都受 `io_timeout` 限制
//!
//! 重试与熔断不在这里实现，需要时用 [`ResilientStore`](crate::cache::ResilientStore) 包装。

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, IntoConnectionInfo};
use secrecy::{ExposeSecret, Secret};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::constants::{DEFAULT_REDIS_KEY_PREFIX, REDIS_SCAN_BATCH_SIZE};
use crate::error::StorageError;
use crate::storage::{normalize_ttl, validate_key, CacheStore, StoreStats};

/// Redis配置
#[derive(Clone)]
pub struct RedisConfig {
    /// Redis连接URL
    pub url: String,
    /// 数据库索引
    pub db: i64,
    /// 密码（使用 Secret 包装以防止意外泄露）
    pub password: Option<Secret<String>>,
    /// 连接超时
    pub connection_timeout: Duration,
    /// 读写超时
    pub io_timeout: Duration,
    /// 键前缀
    pub key_prefix: String,
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("url", &self.url)
            .field("db", &self.db)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("connection_timeout", &self.connection_timeout)
            .field("io_timeout", &self.io_timeout)
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            db: 0,
            password: None,
            connection_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(5),
            key_prefix: DEFAULT_REDIS_KEY_PREFIX.to_string(),
        }
    }
}

impl RedisConfig {
    /// 创建新的Redis配置
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// 设置数据库索引
    pub fn db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    /// 设置密码
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Secret::new(password.into()));
        self
    }

    /// 设置连接超时
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// 设置IO超时
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// 设置键前缀
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}

/// 转义 glob 特殊字符，用于 SCAN MATCH
fn escape_glob(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Redis存储
pub struct RedisStore {
    conn: ConnectionManager,
    config: RedisConfig,
    commands: AtomicU64,
    errors: AtomicU64,
}

impl RedisStore {
    /// 连接Redis并创建存储
    pub async fn connect(config: RedisConfig) -> Result<Self, StorageError> {
        info!("创建Redis存储, URL: {}", config.url);

        let mut info = config.url.as_str().into_connection_info().map_err(|e| {
            error!("解析Redis URL失败: {}", e);
            StorageError::BackendUnavailable(format!("解析Redis URL失败: {}", e))
        })?;
        info.redis.db = config.db;
        if let Some(password) = &config.password {
            info.redis.password = Some(password.expose_secret().clone());
        }

        let client = Client::open(info).map_err(|e| {
            error!("创建Redis客户端失败: {}", e);
            StorageError::BackendUnavailable(format!("创建Redis客户端失败: {}", e))
        })?;

        let conn = tokio::time::timeout(config.connection_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StorageError::Timeout("连接Redis超时".to_string()))?
            .map_err(|e| {
                error!("创建Redis连接管理器失败: {}", e);
                StorageError::BackendUnavailable(format!("创建Redis连接管理器失败: {}", e))
            })?;

        info!("Redis连接建立成功");
        Ok(Self {
            conn,
            config,
            commands: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        })
    }

    fn prefixed(&self, key: &str) -> Result<String, StorageError> {
        validate_key(key)?;
        Ok(format!("{}{}", self.config.key_prefix, key))
    }

    /// 执行单条命令，附带IO超时与错误翻译
    async fn query<T: redis::FromRedisValue>(
        &self,
        cmd: &redis::Cmd,
    ) -> Result<T, StorageError> {
        self.commands.fetch_add(1, Ordering::Relaxed);
        let mut conn = self.conn.clone();
        let result = tokio::time::timeout(self.config.io_timeout, cmd.query_async(&mut conn)).await;
        self.translate(result)
    }

    /// 执行事务管道（MULTI/EXEC）
    async fn query_pipeline<T: redis::FromRedisValue>(
        &self,
        pipe: &redis::Pipeline,
    ) -> Result<T, StorageError> {
        self.commands.fetch_add(1, Ordering::Relaxed);
        let mut conn = self.conn.clone();
        let result =
            tokio::time::timeout(self.config.io_timeout, pipe.query_async(&mut conn)).await;
        self.translate(result)
    }

    fn translate<T>(
        &self,
        result: Result<redis::RedisResult<T>, tokio::time::error::Elapsed>,
    ) -> Result<T, StorageError> {
        let result = match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StorageError::from(e)),
            Err(_) => Err(StorageError::Timeout("Redis命令超时".to_string())),
        };
        if let Err(e) = &result {
            self.errors.fetch_add(1, Ordering::Relaxed);
            debug!("Redis命令失败: {}", e);
        }
        result
    }

    /// 检查Redis连接
    pub async fn ping(&self) -> Result<(), StorageError> {
        let _: String = self.query(&redis::cmd("PING")).await?;
        Ok(())
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }
}

/// PTTL 结果换算为剩余时间：-1 无过期时间，-2 键不存在
fn remaining_from_pttl(pttl: i64) -> Option<Duration> {
    u64::try_from(pttl).ok().map(Duration::from_millis)
}

#[async_trait]
impl CacheStore for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let key = self.prefixed(key)?;
        self.query(redis::cmd("GET").arg(&key)).await
    }

    async fn get_with_ttl(
        &self,
        key: &str,
    ) -> Result<Option<(String, Option<Duration>)>, StorageError> {
        let key = self.prefixed(key)?;
        let mut pipe = redis::pipe();
        pipe.atomic().cmd("GET").arg(&key).cmd("PTTL").arg(&key);
        let (value, pttl): (Option<String>, i64) = self.query_pipeline(&pipe).await?;
        Ok(value.map(|value| (value, remaining_from_pttl(pttl))))
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError> {
        let key = self.prefixed(key)?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(&key).arg(value);
        if let Some(ttl) = normalize_ttl(ttl) {
            // PX 至少 1 毫秒
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            cmd.arg("PX").arg(millis);
        }
        let _: String = self.query(&cmd).await?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let key = self.prefixed(key)?;
        let removed: u64 = self.query(redis::cmd("DEL").arg(&key)).await?;
        Ok(removed > 0)
    }

    async fn has(&self, key: &str) -> Result<bool, StorageError> {
        let key = self.prefixed(key)?;
        let exists: u64 = self.query(redis::cmd("EXISTS").arg(&key)).await?;
        Ok(exists > 0)
    }

    async fn clear(&self) -> Result<bool, StorageError> {
        let pattern = format!("{}*", escape_glob(&self.config.key_prefix));
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = self
                .query(
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(REDIS_SCAN_BATCH_SIZE),
                )
                .await?;
            if !keys.is_empty() {
                let count: u64 = self.query(redis::cmd("DEL").arg(&keys)).await?;
                removed += count;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        info!(prefix = %self.config.key_prefix, removed, "Redis存储已清空");
        Ok(true)
    }

    fn stats(&self) -> StoreStats {
        let mut stats = StoreStats::new();
        stats.insert("key_prefix".into(), self.config.key_prefix.clone().into());
        stats.insert("commands".into(), self.commands.load(Ordering::Relaxed).into());
        stats.insert("errors".into(), self.errors.load(Ordering::Relaxed).into());
        stats
    }
}
