//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 错误类型定义
//!
//! 使用thiserror定义所有错误类型。
//!
//! - [`StorageError`]: 单个存储后端（适配器）层面的错误
//! - [`CacheError`]: 库对外暴露的统一错误
//! - [`ErrorKind`]: 与具体错误值无关的错误种类，用于重试白名单与降级匹配

use thiserror::Error;

/// 存储错误
///
/// 适配器负责把驱动层错误翻译成这里的变体，驱动自身的错误类型不会向外泄露。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// 后端不可达（网络、连接被拒绝等）
    #[error("后端不可用: {0}")]
    BackendUnavailable(String),

    /// 值无法编码或解码
    #[error("序列化失败: {0}")]
    SerializationFailed(String),

    /// 超时错误
    #[error("超时错误: {0}")]
    Timeout(String),

    /// 非法的键（空键或超长）
    #[error("非法的键: {0}")]
    InvalidKey(String),
}

impl StorageError {
    /// 对应的错误种类
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            StorageError::SerializationFailed(_) => ErrorKind::SerializationFailed,
            StorageError::Timeout(_) => ErrorKind::Timeout,
            StorageError::InvalidKey(_) => ErrorKind::InvalidKey,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => StorageError::Timeout(err.to_string()),
            std::io::ErrorKind::InvalidData => StorageError::SerializationFailed(err.to_string()),
            _ => StorageError::BackendUnavailable(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationFailed(err.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            StorageError::Timeout(err.to_string())
        } else if err.kind() == redis::ErrorKind::TypeError {
            StorageError::SerializationFailed(err.to_string())
        } else {
            StorageError::BackendUnavailable(err.to_string())
        }
    }
}

/// Cacheron 错误类型
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// 存储错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),

    /// 指定层中未命中（区别于"所有层均未命中"，后者返回 `Ok(None)`）
    #[error("缓存层 {layer} 中未找到键 {key}")]
    CacheMissInLayer { layer: String, key: String },

    /// 未注册的缓存层
    #[error("未知缓存层: {0}")]
    UnknownLayer(String),

    /// 熔断器打开，调用未被执行
    #[error("熔断器打开，请求被拒绝: {0}")]
    CircuitOpen(String),

    /// 上游数据源中不存在
    #[error("未找到: {0}")]
    NotFound(String),

    /// 上游数据源错误
    #[error("上游错误: {0}")]
    Upstream(String),

    /// 调用方取消
    #[error("操作已取消")]
    Cancelled,

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 其他错误
    #[error("未知错误: {0}")]
    Other(String),
}

impl CacheError {
    /// 对应的错误种类
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::Storage(e) => e.kind(),
            CacheError::CacheMissInLayer { .. } => ErrorKind::CacheMissInLayer,
            CacheError::UnknownLayer(_) => ErrorKind::UnknownLayer,
            CacheError::CircuitOpen(_) => ErrorKind::CircuitOpen,
            CacheError::NotFound(_) => ErrorKind::NotFound,
            CacheError::Upstream(_) => ErrorKind::Upstream,
            CacheError::Cancelled => ErrorKind::Cancelled,
            CacheError::Config(_) => ErrorKind::Config,
            CacheError::Other(_) => ErrorKind::Other,
        }
    }

    /// 默认情况下是否值得重试
    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }

    /// 是否属于"可降级为未命中"的后端错误
    pub fn is_degradable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::BackendUnavailable | ErrorKind::SerializationFailed | ErrorKind::Timeout
        )
    }

    /// 构造后端不可用错误
    pub fn backend_unavailable(msg: impl Into<String>) -> Self {
        CacheError::Storage(StorageError::BackendUnavailable(msg.into()))
    }

    /// 构造序列化错误
    pub fn serialization_failed(msg: impl Into<String>) -> Self {
        CacheError::Storage(StorageError::SerializationFailed(msg.into()))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Storage(StorageError::SerializationFailed(err.to_string()))
    }
}

impl From<serde_yaml::Error> for CacheError {
    fn from(err: serde_yaml::Error) -> Self {
        CacheError::Config(format!("YAML解析错误: {}", err))
    }
}

impl From<toml::de::Error> for CacheError {
    fn from(err: toml::de::Error) -> Self {
        CacheError::Config(format!("TOML解析错误: {}", err))
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Storage(err.into())
    }
}

/// 错误种类
///
/// `Storage` 与 `Cache` 是抽象的父种类，具体错误不会直接产生它们，
/// 只用于降级处理器按层级匹配。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 存储类错误（父种类）
    Storage,
    BackendUnavailable,
    SerializationFailed,
    Timeout,
    InvalidKey,
    /// 缓存管理类错误（父种类）
    Cache,
    CacheMissInLayer,
    UnknownLayer,
    CircuitOpen,
    NotFound,
    Upstream,
    Cancelled,
    Config,
    Other,
}

impl ErrorKind {
    /// 父种类
    pub fn parent(self) -> Option<ErrorKind> {
        match self {
            ErrorKind::BackendUnavailable
            | ErrorKind::SerializationFailed
            | ErrorKind::Timeout
            | ErrorKind::InvalidKey => Some(ErrorKind::Storage),
            ErrorKind::CacheMissInLayer | ErrorKind::UnknownLayer => Some(ErrorKind::Cache),
            _ => None,
        }
    }

    /// 从自身开始沿父链向上遍历
    pub fn ancestry(self) -> impl Iterator<Item = ErrorKind> {
        std::iter::successors(Some(self), |k| k.parent())
    }

    /// 同一输入重试后可能成功的种类
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::BackendUnavailable | ErrorKind::Timeout | ErrorKind::Upstream
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Storage => "storage",
            ErrorKind::BackendUnavailable => "backend_unavailable",
            ErrorKind::SerializationFailed => "serialization_failed",
            ErrorKind::Timeout => "timeout",
            ErrorKind::InvalidKey => "invalid_key",
            ErrorKind::Cache => "cache",
            ErrorKind::CacheMissInLayer => "cache_miss_in_layer",
            ErrorKind::UnknownLayer => "unknown_layer",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "config",
            ErrorKind::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 把后端错误降级为"未命中"
///
/// 调用方可以显式选择宽松语义：`BackendUnavailable`、`SerializationFailed`
/// 与 `Timeout` 变为 `Ok(None)`，其余错误原样返回。
pub trait CacheResultExt<T> {
    fn or_miss(self) -> Result<Option<T>, CacheError>;
}

impl<T> CacheResultExt<T> for Result<Option<T>, CacheError> {
    fn or_miss(self) -> Result<Option<T>, CacheError> {
        match self {
            Err(e) if e.is_degradable() => {
                tracing::warn!(error = %e, kind = %e.kind(), "缓存后端错误，按未命中处理");
                Ok(None)
            }
            other => other,
        }
    }
}

/// 熔断器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CircuitState {
    /// 关闭状态（正常）
    Closed,
    /// 打开状态（熔断）
    Open,
    /// 半开状态（探测）
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "Closed"),
            CircuitState::Open => write!(f, "Open"),
            CircuitState::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// 熔断器统计信息
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CircuitBreakerStats {
    /// 熔断器名称
    pub name: String,
    /// 当前状态
    pub state: CircuitState,
    /// 连续失败次数
    pub failure_count: u64,
    /// 成功次数
    pub success_count: u64,
    /// 被拒绝的调用次数
    pub rejected_calls: u64,
    /// 总调用次数
    pub total_calls: u64,
    /// 最后失败时间
    pub last_failure_time: Option<chrono::DateTime<chrono::Utc>>,
    /// 最后状态变更时间
    pub last_state_change: Option<chrono::DateTime<chrono::Utc>>,
}
