//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 存储抽象层
//!
//! 定义单一后端的缓存存储接口。每个后端自行负责值的序列化与TTL语义，
//! 并把驱动层错误翻译为 [`StorageError`]。

use crate::constants::MAX_KEY_LENGTH;
use crate::error::StorageError;
use ahash::AHashMap as HashMap;
use async_trait::async_trait;
use std::time::Duration;

/// 存储自报的统计信息
///
/// 内容没有约定，仅供观测；不提供统计的后端返回空表。
pub type StoreStats = serde_json::Map<String, serde_json::Value>;

/// 批量操作的逐键结果
pub type BulkResult<T> = HashMap<String, Result<T, StorageError>>;

/// 缓存存储接口
///
/// - 不存在的键返回 `Ok(None)`，从不作为错误
/// - `ttl` 为 `None` 或零表示不过期（后端可以应用自己的默认TTL）
/// - 批量操作等价于 N 次独立的单键操作，不保证跨键原子性，返回部分结果
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 后端标识（用于日志）
    fn name(&self) -> &str;

    /// 获取值
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// 获取值及其剩余存活时间
    ///
    /// 剩余时间为 `None` 表示永不过期或后端无法得知。
    /// 默认实现不了解TTL，总是返回 `None`。
    async fn get_with_ttl(
        &self,
        key: &str,
    ) -> Result<Option<(String, Option<Duration>)>, StorageError> {
        Ok(self.get(key).await?.map(|value| (value, None)))
    }

    /// 设置值
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>)
        -> Result<bool, StorageError>;

    /// 删除值，返回是否确实删除了某个键
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// 检查键是否存在
    async fn has(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some())
    }

    /// 清空本存储拥有的所有键（不影响其他存储）
    async fn clear(&self) -> Result<bool, StorageError>;

    /// 批量获取
    async fn get_multiple(&self, keys: &[String]) -> BulkResult<Option<String>> {
        let mut result = HashMap::with_capacity(keys.len());
        for key in keys {
            result.insert(key.clone(), self.get(key).await);
        }
        result
    }

    /// 批量设置
    async fn set_multiple(
        &self,
        items: &[(String, String)],
        ttl: Option<Duration>,
    ) -> BulkResult<bool> {
        let mut result = HashMap::with_capacity(items.len());
        for (key, value) in items {
            result.insert(key.clone(), self.set(key, value, ttl).await);
        }
        result
    }

    /// 批量删除
    async fn delete_multiple(&self, keys: &[String]) -> BulkResult<bool> {
        let mut result = HashMap::with_capacity(keys.len());
        for key in keys {
            result.insert(key.clone(), self.delete(key).await);
        }
        result
    }

    /// 统计信息
    fn stats(&self) -> StoreStats {
        StoreStats::new()
    }
}

/// 验证键
///
/// 键是不透明的字节序列，只拒绝空键和超长键。
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("键不能为空".to_string()));
    }

    if key.len() > MAX_KEY_LENGTH {
        return Err(StorageError::InvalidKey(format!(
            "键长度超过限制（最大 {} 字节）",
            MAX_KEY_LENGTH
        )));
    }

    Ok(())
}

/// 把零TTL规范化为"不过期"
pub(crate) fn normalize_ttl(ttl: Option<Duration>) -> Option<Duration> {
    ttl.filter(|d| !d.is_zero())
}
