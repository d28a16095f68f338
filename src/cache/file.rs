//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 文件存储实现
//!
//! 持久化缓存层：每个键对应目录下的一个JSON文件，文件中记录原始键、值与过期时间。
//! 文件名为键的URL安全base64编码，写入先落临时文件再原子重命名。
//!
//! 文件内容无法解析时返回 `SerializationFailed`，目录不可访问时返回 `BackendUnavailable`。

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::error::StorageError;
use crate::storage::{normalize_ttl, validate_key, CacheStore, StoreStats};

/// 缓存文件扩展名
const ENTRY_EXTENSION: &str = "json";

/// 编码后文件名的最大长度（常见文件系统限制为255字节）
const MAX_ENCODED_NAME_LENGTH: usize = 240;

/// 落盘的缓存条目
#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    key: String,
    value: String,
    /// 过期时间（Unix毫秒），None表示永不过期
    expires_at: Option<i64>,
}

impl FileEntry {
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| chrono::Utc::now().timestamp_millis() >= at)
    }

    fn remaining_ttl(&self) -> Option<Duration> {
        self.expires_at.map(|at| {
            let left = at.saturating_sub(chrono::Utc::now().timestamp_millis());
            Duration::from_millis(u64::try_from(left).unwrap_or(0))
        })
    }
}

/// 文件存储
pub struct FileStore {
    /// 存储目录
    dir: PathBuf,
    reads: AtomicU64,
    writes: AtomicU64,
    corrupt_entries: AtomicU64,
}

impl FileStore {
    /// 创建文件存储，目录不存在时自动创建
    pub async fn new(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::BackendUnavailable(format!("无法创建缓存目录 {}: {}", dir.display(), e))
        })?;
        info!("创建文件存储, 目录: {}", dir.display());

        Ok(Self {
            dir,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            corrupt_entries: AtomicU64::new(0),
        })
    }

    /// 存储目录
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        let encoded = URL_SAFE_NO_PAD.encode(key.as_bytes());
        if encoded.len() > MAX_ENCODED_NAME_LENGTH {
            return Err(StorageError::InvalidKey(format!(
                "键过长，文件存储最多支持编码后 {} 字节",
                MAX_ENCODED_NAME_LENGTH
            )));
        }
        Ok(self.dir.join(format!("{}.{}", encoded, ENTRY_EXTENSION)))
    }

    /// 读取条目；文件不存在返回 None
    async fn read_entry(&self, path: &Path) -> Result<Option<FileEntry>, StorageError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        self.reads.fetch_add(1, Ordering::Relaxed);

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            self.corrupt_entries.fetch_add(1, Ordering::Relaxed);
            warn!("缓存文件损坏 {}: {}", path.display(), e);
            StorageError::SerializationFailed(format!("缓存文件损坏: {}", e))
        })
    }

    async fn remove_file(path: &Path) -> Result<bool, StorageError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// 读取未过期的条目，过期文件顺带删除
    async fn live_entry(&self, key: &str) -> Result<Option<FileEntry>, StorageError> {
        let path = self.entry_path(key)?;
        match self.read_entry(&path).await? {
            Some(entry) if entry.key == key && !entry.is_expired() => Ok(Some(entry)),
            Some(entry) if entry.is_expired() => {
                trace!(key, "文件条目已过期");
                if let Err(e) = Self::remove_file(&path).await {
                    debug!("删除过期缓存文件失败: {}", e);
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl CacheStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.live_entry(key).await?.map(|entry| entry.value))
    }

    async fn get_with_ttl(
        &self,
        key: &str,
    ) -> Result<Option<(String, Option<Duration>)>, StorageError> {
        Ok(self.live_entry(key).await?.map(|entry| {
            let remaining = entry.remaining_ttl();
            (entry.value, remaining)
        }))
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError> {
        let path = self.entry_path(key)?;
        let expires_at = normalize_ttl(ttl).map(|ttl| {
            let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            chrono::Utc::now().timestamp_millis().saturating_add(ttl_ms)
        });
        let entry = FileEntry {
            key: key.to_string(),
            value: value.to_string(),
            expires_at,
        };
        let bytes = serde_json::to_vec(&entry)?;

        let tmp = path.with_extension(format!("{}.tmp", fastrand::u64(..)));
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.entry_path(key)?;
        // 损坏的文件同样删除，只是不计为存在
        let existed = match self.live_entry(key).await {
            Ok(entry) => entry.is_some(),
            Err(StorageError::SerializationFailed(_)) => false,
            Err(e) => return Err(e),
        };
        let removed = Self::remove_file(&path).await?;
        Ok(existed && removed)
    }

    async fn clear(&self) -> Result<bool, StorageError> {
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        let mut removed = 0usize;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION) {
                if Self::remove_file(&path).await? {
                    removed += 1;
                }
            }
        }
        debug!("文件存储清空, 删除 {} 个文件", removed);
        Ok(true)
    }

    fn stats(&self) -> StoreStats {
        let mut stats = StoreStats::new();
        stats.insert("directory".into(), self.dir.display().to_string().into());
        stats.insert("reads".into(), self.reads.load(Ordering::Relaxed).into());
        stats.insert("writes".into(), self.writes.load(Ordering::Relaxed).into());
        stats.insert(
            "corrupt_entries".into(),
            self.corrupt_entries.load(Ordering::Relaxed).into(),
        );
        stats
    }
}
