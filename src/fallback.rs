//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 降级执行器
//!
//! 操作失败时按错误种类选择替代值。
//!
//! # 查找顺序
//!
//! 1. 与错误种类完全匹配的处理器
//! 2. 沿 [`ErrorKind::parent`] 向上，最近的祖先种类的处理器
//! 3. 默认处理器
//! 4. 都没有时原样返回原始错误
//!
//! 处理器接收 `(错误, 上下文)`，上下文类型由调用方决定（例如请求的键）。

use crate::error::{CacheError, ErrorKind};
use ahash::AHashMap as HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// 处理器表的键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FallbackKey {
    /// 指定错误种类
    Kind(ErrorKind),
    /// 默认处理器
    Default,
}

impl From<ErrorKind> for FallbackKey {
    fn from(kind: ErrorKind) -> Self {
        FallbackKey::Kind(kind)
    }
}

/// 替代值提供者
pub type FallbackHandler<T, C> = Arc<dyn Fn(&CacheError, &C) -> T + Send + Sync>;

/// 降级执行器
pub struct FallbackExecutor<T, C = ()> {
    handlers: HashMap<FallbackKey, FallbackHandler<T, C>>,
    substitutions: AtomicU64,
}

impl<T, C> Default for FallbackExecutor<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C> FallbackExecutor<T, C> {
    /// 创建空的降级执行器（没有处理器时所有错误原样返回）
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            substitutions: AtomicU64::new(0),
        }
    }

    /// 注册指定错误种类的处理器
    ///
    /// 可以注册父种类（如 [`ErrorKind::Storage`]）来覆盖其所有子种类。
    pub fn on<F>(mut self, kind: ErrorKind, handler: F) -> Self
    where
        F: Fn(&CacheError, &C) -> T + Send + Sync + 'static,
    {
        self.handlers.insert(FallbackKey::Kind(kind), Arc::new(handler));
        self
    }

    /// 注册默认处理器
    pub fn on_default<F>(mut self, handler: F) -> Self
    where
        F: Fn(&CacheError, &C) -> T + Send + Sync + 'static,
    {
        self.handlers.insert(FallbackKey::Default, Arc::new(handler));
        self
    }

    /// 为指定错误种类注册固定的替代值
    pub fn value_for(self, kind: ErrorKind, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.on(kind, move |_, _| value.clone())
    }

    /// 运行时注册处理器（覆盖同键的旧处理器）
    pub fn register(&mut self, key: FallbackKey, handler: FallbackHandler<T, C>) {
        self.handlers.insert(key, handler);
    }

    /// 是否存在能处理该种类的处理器
    pub fn handles(&self, kind: ErrorKind) -> bool {
        self.lookup(kind).is_some()
    }

    /// 已替代的次数
    pub fn substitutions(&self) -> u64 {
        self.substitutions.load(Ordering::Relaxed)
    }

    fn lookup(&self, kind: ErrorKind) -> Option<(&FallbackHandler<T, C>, FallbackKey)> {
        kind.ancestry()
            .map(FallbackKey::Kind)
            .chain(std::iter::once(FallbackKey::Default))
            .find_map(|key| self.handlers.get(&key).map(|h| (h, key)))
    }

    /// 对一个已发生的错误执行降级
    ///
    /// 找到处理器时返回替代值，否则原样返回错误。
    pub fn recover(&self, error: CacheError, context: &C) -> Result<T, CacheError> {
        let kind = error.kind();
        match self.lookup(kind) {
            Some((handler, key)) => {
                self.substitutions.fetch_add(1, Ordering::Relaxed);
                info!(kind = %kind, handler = ?key, error = %error, "操作失败，使用降级值");
                Ok(handler(&error, context))
            }
            None => {
                debug!(kind = %kind, "没有匹配的降级处理器，返回原始错误");
                Err(error)
            }
        }
    }

    /// 执行操作，失败时降级
    pub async fn execute<F, Fut>(&self, operation: F, context: &C) -> Result<T, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        match operation().await {
            Ok(value) => Ok(value),
            Err(error) => self.recover(error, context),
        }
    }
}

impl<T, C> std::fmt::Debug for FallbackExecutor<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackExecutor")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("substitutions", &self.substitutions())
            .finish()
    }
}
