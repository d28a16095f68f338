//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 分层缓存管理器
//!
//! 按优先级组织多个 [`CacheStore`]（"层"），提供：
//!
//! - **分层读取**: 从最高优先级开始查找，命中后提升到所有更高优先级的层
//! - **写穿透**: 写入所有层或指定的层子集，逐层报告结果
//! - **读穿透**: `remember` 未命中时调用上游加载，同一键的并发加载只执行一次
//!
//! # 示例
//!
//! ```rust,no_run
//! use cacheron::cache::{MemoryStore, TieredCacheManager};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), cacheron::error::CacheError> {
//! let manager = TieredCacheManager::new();
//! manager.add_layer("memory", Arc::new(MemoryStore::new(1_000)), 10);
//! manager.add_layer("shared", Arc::new(MemoryStore::new(100_000)), 5);
//!
//! manager.set("user:1", "alice", None, None).await.into_result()?;
//! assert_eq!(manager.get("user:1").await?, Some("alice".to_string()));
//! # Ok(())
//! # }
//! ```

use ahash::AHashMap as HashMap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify};
use tracing::{debug, info, trace, warn};

use crate::error::{CacheError, CacheResultExt, StorageError};
use crate::storage::{CacheStore, StoreStats};

#[cfg(feature = "monitoring")]
use crate::telemetry::Metrics;

/// 提升方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionMode {
    /// 在后台任务中提升，`get` 不等待
    #[default]
    Background,
    /// 在 `get` 返回前完成提升（失败同样只记录）
    Inline,
}

/// 已注册的缓存层
#[derive(Clone)]
pub struct Layer {
    name: String,
    store: Arc<dyn CacheStore>,
    priority: i32,
}

impl Layer {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("name", &self.name)
            .field("backend", &self.store.name())
            .field("priority", &self.priority)
            .finish()
    }
}

/// 单层写操作的结果
#[derive(Debug, Clone)]
pub struct LayerOutcome {
    /// 层名称
    pub layer: String,
    /// 存储返回的结果
    pub result: Result<bool, CacheError>,
}

impl LayerOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// 广播写操作的报告
///
/// 写操作尽力而为：某一层失败不会中止其他层。
#[derive(Debug, Clone, Default)]
#[must_use = "写报告可能包含失败的层"]
pub struct WriteReport {
    outcomes: Vec<LayerOutcome>,
}

impl WriteReport {
    /// 所有目标层都成功（没有目标层时为真）
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(LayerOutcome::is_ok)
    }

    /// 至少有一个目标层，且全部失败
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| !o.is_ok())
    }

    /// 失败的层名称
    pub fn failed_layers(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_ok())
            .map(|o| o.layer.as_str())
            .collect()
    }

    /// 所有层的结果（按层优先级顺序，未知层在最后）
    pub fn outcomes(&self) -> &[LayerOutcome] {
        &self.outcomes
    }

    /// 指定层的结果
    pub fn outcome(&self, layer: &str) -> Option<&LayerOutcome> {
        self.outcomes.iter().find(|o| o.layer == layer)
    }

    /// 仅在全部目标层失败时返回错误（第一个失败层的错误）
    pub fn into_result(self) -> Result<WriteReport, CacheError> {
        if self.all_failed() {
            if let Some(Err(e)) = self.outcomes.first().map(|o| &o.result) {
                return Err(e.clone());
            }
        }
        Ok(self)
    }
}

/// 管理器统计信息
#[derive(Debug, Default)]
struct ManagerStats {
    lookups: AtomicU64,
    hits: DashMap<String, u64>,
    misses: AtomicU64,
    promotions: AtomicU64,
    promotion_failures: AtomicU64,
    write_failures: AtomicU64,
    loads: AtomicU64,
}

/// 管理器统计快照
#[derive(Debug, Clone, Default, Serialize)]
pub struct ManagerStatsSnapshot {
    /// 查找次数
    pub lookups: u64,
    /// 各层命中次数
    pub hits: HashMap<String, u64>,
    /// 所有层均未命中的次数
    pub misses: u64,
    /// 成功的提升写入次数（每个目标层计一次）
    pub promotions: u64,
    /// 失败的提升写入次数
    pub promotion_failures: u64,
    /// 失败的层写入次数
    pub write_failures: u64,
    /// `remember` 实际调用上游加载的次数
    pub loads: u64,
}

impl ManagerStatsSnapshot {
    /// 总命中次数
    pub fn total_hits(&self) -> u64 {
        self.hits.values().sum()
    }

    /// 命中率
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.total_hits() as f64 / self.lookups as f64
        }
    }
}

/// 后台提升的计数守卫，任务结束（包括panic）时递减
struct PendingGuard {
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// 正在加载的键：(加载编号, 结果接收端)
type InFlight = DashMap<String, (u64, watch::Receiver<Option<Result<String, CacheError>>>)>;

/// 加载者退出时移除自己的加载登记
struct InFlightGuard<'a> {
    in_flight: &'a InFlight,
    key: &'a str,
    id: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove_if(self.key, |_, (id, _)| *id == self.id);
    }
}

/// 分层缓存管理器
pub struct TieredCacheManager {
    /// 按优先级降序排列的层（写时复制）
    layers: RwLock<Arc<Vec<Layer>>>,
    promotion_mode: PromotionMode,
    default_ttl: Option<Duration>,
    stats: Arc<ManagerStats>,
    in_flight: InFlight,
    next_load_id: AtomicU64,
    pending_promotions: Arc<AtomicUsize>,
    promotions_idle: Arc<Notify>,
    #[cfg(feature = "monitoring")]
    metrics: Option<Arc<Metrics>>,
}

impl Default for TieredCacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TieredCacheManager {
    /// 创建空的管理器
    pub fn new() -> Self {
        Self {
            layers: RwLock::new(Arc::new(Vec::new())),
            promotion_mode: PromotionMode::default(),
            default_ttl: None,
            stats: Arc::new(ManagerStats::default()),
            in_flight: DashMap::new(),
            next_load_id: AtomicU64::new(0),
            pending_promotions: Arc::new(AtomicUsize::new(0)),
            promotions_idle: Arc::new(Notify::new()),
            #[cfg(feature = "monitoring")]
            metrics: None,
        }
    }

    /// 设置提升方式
    pub fn with_promotion_mode(mut self, mode: PromotionMode) -> Self {
        self.promotion_mode = mode;
        self
    }

    /// 设置默认TTL（写入未指定TTL时使用，也是提升副本TTL的上限）
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl).filter(|d| !d.is_zero());
        self
    }

    /// 附加Prometheus指标
    #[cfg(feature = "monitoring")]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn promotion_mode(&self) -> PromotionMode {
        self.promotion_mode
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    // ========================================================================
    // 层管理
    // ========================================================================

    /// 注册缓存层
    ///
    /// 同名的层会被替换。相同优先级的层保持注册顺序。
    pub fn add_layer(&self, name: impl Into<String>, store: Arc<dyn CacheStore>, priority: i32) {
        let name = name.into();
        let mut guard = self.layers.write();
        let mut layers: Vec<Layer> = guard.iter().filter(|l| l.name != name).cloned().collect();
        let replaced = layers.len() != guard.len();

        info!(
            layer = %name,
            backend = store.name(),
            priority,
            replaced,
            "注册缓存层"
        );
        layers.push(Layer {
            name,
            store,
            priority,
        });
        layers.sort_by(|a, b| b.priority.cmp(&a.priority));
        *guard = Arc::new(layers);
    }

    /// 移除缓存层，返回是否存在
    pub fn remove_layer(&self, name: &str) -> bool {
        let mut guard = self.layers.write();
        if !guard.iter().any(|l| l.name == name) {
            return false;
        }
        let layers: Vec<Layer> = guard.iter().filter(|l| l.name != name).cloned().collect();
        *guard = Arc::new(layers);
        info!(layer = %name, "移除缓存层");
        true
    }

    /// 当前层的快照（按优先级降序）
    pub fn layers(&self) -> Arc<Vec<Layer>> {
        Arc::clone(&self.layers.read())
    }

    /// 层名称（按优先级降序）
    pub fn layer_names(&self) -> Vec<String> {
        self.layers().iter().map(|l| l.name.clone()).collect()
    }

    fn find_layer(&self, name: &str) -> Result<Layer, CacheError> {
        self.layers()
            .iter()
            .find(|l| l.name == name)
            .cloned()
            .ok_or_else(|| CacheError::UnknownLayer(name.to_string()))
    }

    // ========================================================================
    // 读取
    // ========================================================================

    /// 分层读取
    ///
    /// 依次查询各层，第一个命中的值被提升到所有优先级更高的层。
    /// 所有层均未命中时返回 `Ok(None)`。查询出错的层会被跳过，
    /// 只有所有层都出错时才返回最后一个错误。
    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let start = Instant::now();
        let layers = self.layers();
        self.stats.lookups.fetch_add(1, Ordering::Relaxed);

        let mut errors = 0usize;
        let mut last_error: Option<StorageError> = None;

        for layer in layers.iter() {
            match layer.store.get_with_ttl(key).await {
                Ok(Some((value, remaining))) => {
                    *self.stats.hits.entry(layer.name.clone()).or_insert(0) += 1;
                    debug!(
                        op = "get",
                        key,
                        layer = %layer.name,
                        outcome = "hit",
                        latency_us = start.elapsed().as_micros() as u64,
                        "缓存命中"
                    );
                    #[cfg(feature = "monitoring")]
                    if let Some(metrics) = &self.metrics {
                        metrics.record_hit(&layer.name);
                    }

                    self.promote(&layers, layer, key, &value, remaining).await;
                    self.observe_lookup(start);
                    return Ok(Some(value));
                }
                Ok(None) => {
                    trace!(op = "get", key, layer = %layer.name, outcome = "miss", "缓存层未命中");
                }
                Err(e) => {
                    errors += 1;
                    warn!(
                        op = "get",
                        key,
                        layer = %layer.name,
                        outcome = "error",
                        error = %e,
                        "缓存层查询失败，跳过"
                    );
                    last_error = Some(e);
                }
            }
        }

        self.observe_lookup(start);
        if errors > 0 && errors == layers.len() {
            if let Some(e) = last_error {
                return Err(e.into());
            }
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "monitoring")]
        if let Some(metrics) = &self.metrics {
            metrics.record_miss();
        }
        debug!(
            op = "get",
            key,
            outcome = "miss",
            latency_us = start.elapsed().as_micros() as u64,
            "所有缓存层均未命中"
        );
        Ok(None)
    }

    /// 只查询指定层
    ///
    /// 未命中返回 [`CacheError::CacheMissInLayer`]，未知层返回 [`CacheError::UnknownLayer`]。
    pub async fn get_in_layer(&self, key: &str, layer: &str) -> Result<String, CacheError> {
        let target = self.find_layer(layer)?;
        match target.store.get(key).await? {
            Some(value) => {
                *self.stats.hits.entry(target.name.clone()).or_insert(0) += 1;
                debug!(op = "get_in_layer", key, layer, outcome = "hit", "缓存命中");
                Ok(value)
            }
            None => {
                debug!(op = "get_in_layer", key, layer, outcome = "miss", "指定层未命中");
                Err(CacheError::CacheMissInLayer {
                    layer: layer.to_string(),
                    key: key.to_string(),
                })
            }
        }
    }

    /// 宽松读取：后端错误按未命中处理
    pub async fn get_or_absent(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.get(key).await.or_miss()
    }

    /// 读取并反序列化JSON值
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// 检查键是否存在
    ///
    /// 指定层时只查询该层；否则任一层存在即为真，所有层都出错时返回错误。
    pub async fn has(&self, key: &str, layer: Option<&str>) -> Result<bool, CacheError> {
        if let Some(name) = layer {
            let target = self.find_layer(name)?;
            return Ok(target.store.has(key).await?);
        }

        let layers = self.layers();
        let mut errors = 0usize;
        let mut last_error = None;
        for layer in layers.iter() {
            match layer.store.has(key).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => {
                    errors += 1;
                    warn!(op = "has", key, layer = %layer.name, error = %e, "缓存层查询失败");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if errors == layers.len() => Err(e.into()),
            _ => Ok(false),
        }
    }

    // ========================================================================
    // 提升
    // ========================================================================

    /// 提升副本的TTL：源条目剩余时间与默认TTL中较短者
    ///
    /// 返回 `Err(())` 表示源条目已到期，不应提升。
    fn promotion_ttl(&self, remaining: Option<Duration>) -> Result<Option<Duration>, ()> {
        match (remaining, self.default_ttl) {
            (Some(left), _) if left.is_zero() => Err(()),
            (Some(left), Some(default)) => Ok(Some(left.min(default))),
            (left, default) => Ok(left.or(default)),
        }
    }

    async fn promote(
        &self,
        layers: &[Layer],
        hit: &Layer,
        key: &str,
        value: &str,
        remaining: Option<Duration>,
    ) {
        let Ok(ttl) = self.promotion_ttl(remaining) else {
            trace!(op = "promote", key, from = %hit.name, "源条目已到期，跳过提升");
            return;
        };
        let targets: Vec<Layer> = layers
            .iter()
            .filter(|l| l.priority > hit.priority)
            .cloned()
            .collect();
        if targets.is_empty() {
            return;
        }

        let job = PromotionJob {
            targets,
            source: hit.name.clone(),
            key: key.to_string(),
            value: value.to_string(),
            ttl,
            stats: Arc::clone(&self.stats),
            #[cfg(feature = "monitoring")]
            metrics: self.metrics.clone(),
        };

        let handle = match self.promotion_mode {
            PromotionMode::Background => tokio::runtime::Handle::try_current().ok(),
            PromotionMode::Inline => None,
        };

        match handle {
            Some(handle) => {
                self.pending_promotions.fetch_add(1, Ordering::AcqRel);
                let guard = PendingGuard {
                    pending: Arc::clone(&self.pending_promotions),
                    idle: Arc::clone(&self.promotions_idle),
                };
                handle.spawn(async move {
                    let _guard = guard;
                    job.run().await;
                });
            }
            None => job.run().await,
        }
    }

    /// 等待所有后台提升完成
    pub async fn wait_for_promotions(&self) {
        loop {
            let idle = self.promotions_idle.notified();
            if self.pending_promotions.load(Ordering::Acquire) == 0 {
                return;
            }
            idle.await;
        }
    }

    // ========================================================================
    // 写入
    // ========================================================================

    /// 解析目标层；未知层名以失败结果报告
    fn targets(&self, layers: Option<&[&str]>) -> (Vec<Layer>, Vec<LayerOutcome>) {
        let all = self.layers();
        match layers {
            None => (all.to_vec(), Vec::new()),
            Some(names) => {
                let targets = all
                    .iter()
                    .filter(|l| names.contains(&l.name.as_str()))
                    .cloned()
                    .collect();
                let unknown = names
                    .iter()
                    .filter(|n| !all.iter().any(|l| l.name == **n))
                    .map(|n| LayerOutcome {
                        layer: n.to_string(),
                        result: Err(CacheError::UnknownLayer(n.to_string())),
                    })
                    .collect();
                (targets, unknown)
            }
        }
    }

    /// 并行地对目标层执行写操作
    async fn broadcast<F, Fut>(
        &self,
        op: &'static str,
        key: Option<&str>,
        layers: Option<&[&str]>,
        f: F,
    ) -> WriteReport
    where
        F: Fn(Layer) -> Fut,
        Fut: Future<Output = Result<bool, StorageError>>,
    {
        let (targets, unknown) = self.targets(layers);
        let futures = targets.into_iter().map(|layer| {
            let name = layer.name.clone();
            let fut = f(layer);
            async move { (name, fut.await) }
        });

        let mut outcomes: Vec<LayerOutcome> = join_all(futures)
            .await
            .into_iter()
            .map(|(layer, result)| {
                if let Err(e) = &result {
                    self.stats.write_failures.fetch_add(1, Ordering::Relaxed);
                    #[cfg(feature = "monitoring")]
                    if let Some(metrics) = &self.metrics {
                        metrics.record_write_failure(&layer);
                    }
                    warn!(op, key, layer = %layer, outcome = "error", error = %e, "缓存层写入失败");
                } else {
                    trace!(op, key, layer = %layer, outcome = "ok", "缓存层写入成功");
                }
                LayerOutcome {
                    layer,
                    result: result.map_err(CacheError::from),
                }
            })
            .collect();
        outcomes.extend(unknown);

        WriteReport { outcomes }
    }

    /// 写入所有层或指定层
    ///
    /// `ttl` 为 `None` 时使用管理器的默认TTL。
    pub async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
        layers: Option<&[&str]>,
    ) -> WriteReport {
        let ttl = ttl.or(self.default_ttl);
        self.broadcast("set", Some(key), layers, |layer| async move {
            layer.store.set(key, value, ttl).await
        })
        .await
    }

    /// 序列化为JSON后写入
    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        layers: Option<&[&str]>,
    ) -> Result<WriteReport, CacheError> {
        let raw = serde_json::to_string(value)?;
        Ok(self.set(key, &raw, ttl, layers).await)
    }

    /// 从所有层或指定层删除
    pub async fn delete(&self, key: &str, layers: Option<&[&str]>) -> WriteReport {
        self.broadcast("delete", Some(key), layers, |layer| async move {
            layer.store.delete(key).await
        })
        .await
    }

    /// 清空所有层或指定层
    pub async fn clear(&self, layers: Option<&[&str]>) -> WriteReport {
        let report = self
            .broadcast("clear", None, layers, |layer| async move {
                layer.store.clear().await
            })
            .await;
        info!(failed = ?report.failed_layers(), "清空缓存层");
        report
    }

    // ========================================================================
    // 读穿透
    // ========================================================================

    /// 读穿透
    ///
    /// 命中时直接返回；未命中时调用 `fetch`，成功后写入所有层并返回。
    /// 同一键的并发未命中只调用一次 `fetch`，其余调用方等待同一结果。
    /// 缓存后端出错时按未命中处理，不阻塞上游加载。
    pub async fn remember<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Result<String, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, CacheError>>,
    {
        let mut fetch = Some(fetch);

        loop {
            if let Some(value) = self.get(key).await.or_miss()? {
                return Ok(value);
            }

            let waiting = match self.in_flight.entry(key.to_string()) {
                Entry::Occupied(entry) => Err(entry.get().1.clone()),
                Entry::Vacant(entry) => {
                    let id = self.next_load_id.fetch_add(1, Ordering::Relaxed);
                    let (tx, rx) = watch::channel(None);
                    entry.insert((id, rx));
                    Ok((id, tx))
                }
            };

            match waiting {
                Err(mut rx) => {
                    trace!(key, "等待其他请求加载");
                    if let Ok(result) = rx.wait_for(Option::is_some).await {
                        if let Some(result) = result.clone() {
                            return result;
                        }
                    }
                    // 加载者被取消，重新竞争
                    debug!(key, "加载者提前退出，重新加载");
                }
                Ok((id, tx)) => {
                    let _guard = InFlightGuard {
                        in_flight: &self.in_flight,
                        key,
                        id,
                    };
                    let Some(fetch) = fetch.take() else {
                        return Err(CacheError::Other("加载函数已被使用".to_string()));
                    };

                    self.stats.loads.fetch_add(1, Ordering::Relaxed);
                    let result = fetch().await;
                    if let Ok(value) = &result {
                        let report = self.set(key, value, ttl, None).await;
                        if !report.is_success() {
                            warn!(key, failed = ?report.failed_layers(), "加载结果写回缓存失败");
                        }
                    } else if let Err(e) = &result {
                        debug!(key, error = %e, "上游加载失败");
                    }

                    let _ = tx.send(Some(result.clone()));
                    return result;
                }
            }
        }
    }

    /// 读穿透（JSON）
    pub async fn remember_json<T, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        let raw = self
            .remember(key, ttl, || async move {
                let value = fetch().await?;
                Ok(serde_json::to_string(&value)?)
            })
            .await?;
        Ok(serde_json::from_str(&raw)?)
    }

    // ========================================================================
    // 统计
    // ========================================================================

    /// 各层自报的统计信息
    pub fn stats(&self) -> HashMap<String, StoreStats> {
        self.layers()
            .iter()
            .map(|l| (l.name.clone(), l.store.stats()))
            .collect()
    }

    /// 管理器自身的计数
    pub fn manager_stats(&self) -> ManagerStatsSnapshot {
        ManagerStatsSnapshot {
            lookups: self.stats.lookups.load(Ordering::Relaxed),
            hits: self
                .stats
                .hits
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            misses: self.stats.misses.load(Ordering::Relaxed),
            promotions: self.stats.promotions.load(Ordering::Relaxed),
            promotion_failures: self.stats.promotion_failures.load(Ordering::Relaxed),
            write_failures: self.stats.write_failures.load(Ordering::Relaxed),
            loads: self.stats.loads.load(Ordering::Relaxed),
        }
    }

    fn observe_lookup(&self, _start: Instant) {
        #[cfg(feature = "monitoring")]
        if let Some(metrics) = &self.metrics {
            metrics.observe_lookup(_start.elapsed());
        }
    }
}

impl std::fmt::Debug for TieredCacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCacheManager")
            .field("layers", &self.layers())
            .field("promotion_mode", &self.promotion_mode)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

/// 一次提升：把命中的值写入所有更高优先级的层
struct PromotionJob {
    targets: Vec<Layer>,
    source: String,
    key: String,
    value: String,
    ttl: Option<Duration>,
    stats: Arc<ManagerStats>,
    #[cfg(feature = "monitoring")]
    metrics: Option<Arc<Metrics>>,
}

impl PromotionJob {
    async fn run(self) {
        let (key, value, ttl) = (self.key.as_str(), self.value.as_str(), self.ttl);
        let writes = self
            .targets
            .iter()
            .map(|layer| async move { (layer, layer.store.set(key, value, ttl).await) });

        for (layer, result) in join_all(writes).await {
            match result {
                Ok(_) => {
                    self.stats.promotions.fetch_add(1, Ordering::Relaxed);
                    #[cfg(feature = "monitoring")]
                    if let Some(metrics) = &self.metrics {
                        metrics.record_promotion(&layer.name);
                    }
                    debug!(
                        op = "promote",
                        key = %self.key,
                        from = %self.source,
                        layer = %layer.name,
                        outcome = "ok",
                        "值已提升"
                    );
                }
                Err(e) => {
                    self.stats.promotion_failures.fetch_add(1, Ordering::Relaxed);
                    #[cfg(feature = "monitoring")]
                    if let Some(metrics) = &self.metrics {
                        metrics.record_promotion_failure(&layer.name);
                    }
                    warn!(
                        op = "promote",
                        key = %self.key,
                        from = %self.source,
                        layer = %layer.name,
                        outcome = "error",
                        error = %e,
                        "提升失败"
                    );
                }
            }
        }
    }
}
